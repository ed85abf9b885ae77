pub mod deal;
pub mod monte_carlo;
pub mod scenarios;
