mod gate;
mod pacer;
mod run;
mod signal;
mod worker;

pub use gate::IterationGate;
pub use pacer::ArrivalPacer;
pub use run::{run_scenario, run_scenario_with};
pub use signal::{DrainSignal, StartSignal};
pub use worker::{WorkerContext, WorkerWork};
