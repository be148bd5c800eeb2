//! Built-in code generators

mod cpp;
mod csharp;
mod python;

pub use cpp::CppGenerator;
pub use csharp::CSharpGenerator;
pub use python::PythonGenerator;
