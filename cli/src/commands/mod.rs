pub mod default_config;
pub mod inspect;
pub mod run;
