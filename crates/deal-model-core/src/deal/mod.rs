pub mod parameters;
pub mod projection;
pub mod returns;

pub use parameters::{DealAssumptions, ParameterOverrides, ParameterSet};
pub use projection::{project_cash_flows, CashFlowSchedule, DealCase, ProjectionProfile};
pub use returns::{
    analyze_deal, evaluate_returns, DealAnalysisInput, DealAnalysisOutput, DealReturns,
};
