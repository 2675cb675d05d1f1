// SPDX-License-Identifier: Apache-2.0

mod model;

pub use model::{Error, ErrorClass, ErrorCode, ExitCode, MachineError, Result};
