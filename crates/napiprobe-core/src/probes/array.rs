use napiprobe_abi::{AbiCall, Env};

use crate::completion::Completion;
use crate::error::{ProbeResult, Required};

/// Allocate an array of `size` empty slots.
pub fn make_empty_array<E: Env>(env: &mut E, size: u32) -> ProbeResult<Completion<E::Value>> {
    let array = env
        .create_array_with_length(size)
        .required(AbiCall::CreateArrayWithLength)?;
    Ok(Completion::Return(array))
}
