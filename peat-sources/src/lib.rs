//! # PEAT Sources
//!
//! Concrete lookup adapters behind the `peat-core` traits:
//!
//! - [`HibpClient`]: breach history over the Have I Been Pwned v3 API
//! - [`HoleheProbe`]: service registrations via the holehe runner script
//! - [`SherlockProbe`]: username presence via sherlock
//! - [`OpenAiNarrator`] / [`TemplateNarrator`]: narrative reports
//!
//! Every adapter returns a typed result or a classified [`PeatError`](peat_core::PeatError);
//! deciding how to degrade is left to the scanner.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod hibp;
mod holehe;
mod openai;
mod process;
mod sherlock;
mod template;

pub use hibp::{HibpClient, HibpConfig};
pub use holehe::{parse_holehe_output, HoleheProbe, HoleheReport};
pub use openai::{OpenAiConfig, OpenAiNarrator};
pub use process::ProbeConfig;
pub use sherlock::{parse_sherlock_output, SherlockProbe};
pub use template::TemplateNarrator;
