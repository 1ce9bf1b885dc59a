pub mod energy;
pub mod evaluate;
pub mod inspect;
pub mod sample;
pub mod train;
pub mod validate;

use std::error::Error;
use std::path::Path;

use clap::ValueEnum;
use qst_rbm::{autoload, LoadedModel, ModelKind};
use serde::Serialize;

/// Model family selectable on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Positive,
    Complex,
}

impl From<KindArg> for ModelKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Positive => ModelKind::Positive,
            KindArg::Complex => ModelKind::Complex,
        }
    }
}

pub fn load_model(path: &Path) -> Result<LoadedModel, Box<dyn Error>> {
    let (model, _) = autoload(path)?;
    Ok(model)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
