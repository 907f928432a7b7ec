pub mod authorization;
pub mod usecases;
