//! 128-bit object type tags.

use napiprobe_abi::{AbiCall, Env, TypeTag};

use crate::completion::Completion;
use crate::error::{ProbeResult, Required};

pub fn add_tag<E: Env>(
    env: &mut E,
    object: E::Value,
    lower: u32,
    upper: u32,
) -> ProbeResult<Completion<E::Value>> {
    let tag = TypeTag::from_u32_halves(lower, upper);
    env.type_tag_object(object, &tag)
        .required(AbiCall::TypeTagObject)?;
    Ok(Completion::Success)
}

pub fn check_tag<E: Env>(
    env: &mut E,
    object: E::Value,
    lower: u32,
    upper: u32,
) -> ProbeResult<Completion<E::Value>> {
    let tag = TypeTag::from_u32_halves(lower, upper);
    let matches = env
        .check_object_type_tag(object, &tag)
        .required(AbiCall::CheckObjectTypeTag)?;
    let matches = env.get_boolean(matches).required(AbiCall::GetBoolean)?;
    Ok(Completion::Return(matches))
}
