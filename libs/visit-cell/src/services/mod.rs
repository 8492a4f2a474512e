pub mod lifecycle;
pub mod visit;

pub use lifecycle::TransitionTable;
pub use visit::VisitService;
