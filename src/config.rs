pub const TICK_FREQUENCY: u32 = 60;
pub const FRAME_FREQUENCY: u32 = 60;

pub const GOOD_TICK_FREQUENCY_DIFF: f64 = 1.0;
pub const OKAY_TICK_FREQUENCY_DIFF: f64 = 10.0;

#[derive(Clone, Debug)]
pub struct VMConfig {
    pub title: String,
    pub tick_frequency: u32,
    pub debugging: bool,
    pub logging: bool,
    pub tracing: bool,
    pub seed: Option<u64>,
}

impl Default for VMConfig {
    fn default() -> Self {
        VMConfig {
            title: String::new(),
            tick_frequency: TICK_FREQUENCY,
            debugging: false,
            logging: false,
            tracing: false,
            seed: None,
        }
    }
}
