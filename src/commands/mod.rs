pub mod convert;
pub mod inspect;
pub mod reset;
pub mod run;
