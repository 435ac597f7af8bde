use crate::analyze::expr::Function;

/// Names a module generated for a function nested under its namespace's
/// module, e.g. `user$print_all_0`.
pub fn nest_module(parent: &str, child: &str) -> String {
    format!("{}${}", parent, child)
}

/// Capability through which function analysis reaches code generation
/// when the runtime is compiling. The analyzer records the module
/// dependency and persists whatever declaration text the writer returns;
/// it never sees the generator's own types.
pub trait ModuleWriter {
    fn declaration(&self, module: &str, f: &Function) -> String;
}
