//! Utilities for the deploy scripts.

use alloy::{
    dyn_abi::{DynSolValue, JsonAbiExt, Specifier},
    json_abi::{Function, JsonAbi},
};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolConstructor;
use itertools::Itertools;

use crate::{
    constants::{NUM_BYTES_ADDRESS, NUM_BYTES_STORAGE_SLOT},
    errors::DeployError,
    solidity::ERC1967Proxy,
    types::BuildArtifact,
};

/// Prepare calldata for the implementation's initializer, coercing each
/// command-line argument to the type the ABI declares for it.
///
/// Yields empty calldata when the ABI has no such function and no
/// arguments were given, in which case the proxy skips initialization.
pub fn initializer_calldata(
    abi: &JsonAbi,
    initializer: &str,
    args: &[String],
) -> Result<Bytes, DeployError> {
    let overloads = abi.function(initializer).map(Vec::as_slice).unwrap_or_default();
    if overloads.is_empty() {
        if args.is_empty() {
            return Ok(Bytes::new());
        }
        return Err(DeployError::Configuration(format!(
            "{} initializer arguments given, but the contract has no `{}` function",
            args.len(),
            initializer
        )));
    }

    let function = select_overload(overloads, initializer, args.len())?;
    let values: Vec<DynSolValue> = function
        .inputs
        .iter()
        .zip(args)
        .map(|(param, raw)| {
            let ty = param.resolve().map_err(|e| {
                DeployError::Configuration(format!("unsupported parameter type {}: {}", param.ty, e))
            })?;
            ty.coerce_str(raw).map_err(|e| {
                DeployError::Configuration(format!(
                    "invalid value {:?} for parameter `{}` of type {}: {}",
                    raw, param.name, param.ty, e
                ))
            })
        })
        .collect::<Result<_, _>>()?;

    function
        .abi_encode_input(&values)
        .map(Bytes::from)
        .map_err(|e| DeployError::Configuration(format!("error encoding initializer call: {}", e)))
}

/// Pick the initializer overload taking `arity` arguments
fn select_overload<'a>(
    overloads: &'a [Function],
    initializer: &str,
    arity: usize,
) -> Result<&'a Function, DeployError> {
    let mut matching = overloads.iter().filter(|f| f.inputs.len() == arity);
    match (matching.next(), matching.next()) {
        (Some(function), None) => Ok(function),
        (None, _) => Err(DeployError::Configuration(format!(
            "no overload of `{}` takes {} arguments (available: {})",
            initializer,
            arity,
            overloads.iter().map(|f| f.signature()).join(", ")
        ))),
        (Some(_), Some(_)) => Err(DeployError::Configuration(format!(
            "`{}` is overloaded with {} parameters, cannot pick one",
            initializer, arity
        ))),
    }
}

/// Check that `artifact` can back an upgradeable proxy: it must have code,
/// and since a proxy never runs the implementation's constructor, that
/// constructor must not take arguments
pub fn validate_implementation(artifact: &BuildArtifact) -> Result<(), DeployError> {
    if artifact.bytecode.is_empty() {
        return Err(DeployError::Configuration(format!(
            "artifact for {} has empty bytecode (abstract contract or interface?)",
            artifact.contract_name
        )));
    }

    if artifact.abi.constructor.as_ref().is_some_and(|c| !c.inputs.is_empty()) {
        return Err(DeployError::Configuration(format!(
            "{} has a constructor with parameters, which a proxy never runs",
            artifact.contract_name
        )));
    }

    Ok(())
}

/// Prepare the creation code of an `ERC1967Proxy` pointing at `implementation`
pub fn proxy_creation_code(
    proxy: &BuildArtifact,
    implementation: Address,
    init_data: Bytes,
) -> Result<Bytes, DeployError> {
    if proxy.bytecode.is_empty() {
        return Err(DeployError::Configuration(format!(
            "proxy artifact {} has empty bytecode",
            proxy.contract_name
        )));
    }

    let args = ERC1967Proxy::constructorCall { implementation, _data: init_data }.abi_encode();
    Ok([proxy.bytecode.as_ref(), args.as_slice()].concat().into())
}

/// Extract the address held in the low bytes of a storage word
pub fn address_from_slot(word: U256) -> Address {
    let bytes = word.to_be_bytes::<NUM_BYTES_STORAGE_SLOT>();
    Address::from_slice(&bytes[NUM_BYTES_STORAGE_SLOT - NUM_BYTES_ADDRESS..])
}
