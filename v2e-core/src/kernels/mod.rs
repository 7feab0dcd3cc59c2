pub mod photoreceptor;
pub mod diffuser;
pub mod noise;
pub mod thresholds;
pub mod refractory_period;
pub mod change_detector;
