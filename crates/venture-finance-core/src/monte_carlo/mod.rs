pub mod exit_risk;
pub mod simulation;
