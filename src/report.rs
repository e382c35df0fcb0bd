//! Crash log interpretation: the interpreter seam, the supported target
//! table, and the kernel console parser/symbolizer.

pub mod guilty;
pub mod interpreter;
pub mod kernel;
pub mod targets;

pub use interpreter::{CrashInterpreter, InterpreterFactory, ParsedReport, Platform};
pub use kernel::{KernelInterpreter, KernelInterpreterFactory};
