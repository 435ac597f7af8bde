pub mod analyze;
pub mod ast;
pub mod error;
pub mod module;
pub mod reader;
pub mod runtime;
pub mod symbols;

pub use analyze::{Analysis, Processor};
pub use error::AniseError;
pub use runtime::RuntimeCtx;

use reader::Reader;

/// Reads and analyzes a unit of source against the given runtime
/// context. The result carries the wrapped top-level function, the frame
/// tree, and the var map.
pub fn analyze_source(source: &str, ctx: &RuntimeCtx) -> Result<Analysis, AniseError> {
    let reader = Reader::new(source);
    let mut processor = Processor::new(ctx);
    let expr = processor.analyze_program(reader)?;
    Ok(processor.into_analysis(expr))
}
