//! 命令定义和实现

pub mod check;
pub mod run;
pub mod simulate;

pub use check::CheckCommand;
pub use run::RunCommand;
pub use simulate::SimulateCommand;
