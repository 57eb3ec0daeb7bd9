//! Reading compiled contracts from the build artifact store

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy::json_abi::JsonAbi;
use alloy_primitives::Bytes;
use serde::Deserialize;
use tracing::debug;

use crate::{
    constants::BUILD_INFO_DIR,
    errors::DeployError,
    types::BuildArtifact,
};

/// A source of compiled contracts
pub trait ArtifactStore {
    /// Look up the artifact for `contract_name`. Reading has no side effects
    fn load(&self, contract_name: &str) -> Result<BuildArtifact, DeployError>;
}

/// An artifact store over a compiler output directory.
///
/// Both hardhat (`artifacts/`) and foundry (`out/`) layouts are understood:
/// the directory is searched recursively for `<ContractName>.json`.
#[derive(Clone, Debug)]
pub struct FsArtifactStore {
    /// The compiler output directory
    root: PathBuf,
}

/// The on-disk shape shared by hardhat and foundry artifacts
#[derive(Deserialize)]
struct RawArtifact {
    /// The contract name, present in hardhat artifacts only
    #[serde(rename = "contractName")]
    contract_name: Option<String>,
    /// The contract ABI
    abi: JsonAbi,
    /// The creation bytecode
    bytecode: RawBytecode,
}

/// Hardhat stores bytecode as a hex string, foundry as an object
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    /// `"bytecode": "0x..."`
    Hex(String),
    /// `"bytecode": { "object": "0x...", ... }`
    Object {
        /// The hex-encoded bytecode
        object: String,
    },
}

impl RawBytecode {
    /// The hex-encoded bytecode
    fn hex(&self) -> &str {
        match self {
            RawBytecode::Hex(s) => s,
            RawBytecode::Object { object } => object,
        }
    }
}

impl FsArtifactStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find every artifact file for `contract_name` below `dir`
    fn find(&self, dir: &Path, file_name: &str, found: &mut Vec<PathBuf>) -> Result<(), DeployError> {
        let entries = fs::read_dir(dir).map_err(|e| {
            DeployError::Configuration(format!("error reading artifacts at {}: {}", dir.display(), e))
        })?;

        for entry in entries {
            let path = entry
                .map_err(|e| DeployError::Configuration(format!("error reading artifacts: {}", e)))?
                .path();

            if path.is_dir() {
                if path.file_name().is_some_and(|name| name != BUILD_INFO_DIR) {
                    self.find(&path, file_name, found)?;
                }
            } else if path.file_name().is_some_and(|name| name == file_name) {
                found.push(path);
            }
        }

        Ok(())
    }

    /// Parse the artifact file at `path`
    fn parse(path: &Path, contract_name: &str) -> Result<BuildArtifact, DeployError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            DeployError::Configuration(format!("error reading {}: {}", path.display(), e))
        })?;
        let raw: RawArtifact = serde_json::from_str(&contents).map_err(|e| {
            DeployError::Configuration(format!("error parsing artifact {}: {}", path.display(), e))
        })?;

        let hex = raw.bytecode.hex();
        if hex.contains("__$") {
            return Err(DeployError::Configuration(format!(
                "artifact {} has unlinked library references",
                path.display()
            )));
        }
        let bytecode = Bytes::from_str(hex).map_err(|e| {
            DeployError::Configuration(format!("invalid bytecode in {}: {}", path.display(), e))
        })?;

        Ok(BuildArtifact {
            contract_name: raw.contract_name.unwrap_or_else(|| contract_name.to_string()),
            abi: raw.abi,
            bytecode,
        })
    }
}

impl ArtifactStore for FsArtifactStore {
    fn load(&self, contract_name: &str) -> Result<BuildArtifact, DeployError> {
        let file_name = format!("{contract_name}.json");
        let mut found = Vec::new();
        self.find(&self.root, &file_name, &mut found)?;

        match found.as_slice() {
            [] => Err(DeployError::Configuration(format!(
                "no artifact for {} under {}; has the project been compiled?",
                contract_name,
                self.root.display()
            ))),
            [path] => {
                debug!(contract = contract_name, path = %path.display(), "loading artifact");
                Self::parse(path, contract_name)
            }
            paths => Err(DeployError::Configuration(format!(
                "multiple artifacts for {}: {}",
                contract_name,
                paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Write `contents` to `root/rel`, creating parent directories
    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_loads_hardhat_artifact() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "contracts/AMTConfig.sol/AMTConfig.json",
            r#"{"_format":"hh-sol-artifact-1","contractName":"AMTConfig","sourceName":"contracts/AMTConfig.sol",
                "abi":[],"bytecode":"0x6080604052","deployedBytecode":"0x"}"#,
        );
        write(dir.path(), "contracts/AMTConfig.sol/AMTConfig.dbg.json", r#"{"buildInfo":"x"}"#);
        write(dir.path(), "build-info/AMTConfig.json", "not an artifact");

        let artifact = FsArtifactStore::new(dir.path()).load("AMTConfig").unwrap();

        assert_eq!(artifact.contract_name, "AMTConfig");
        assert_eq!(artifact.bytecode.as_ref(), &[0x60, 0x80, 0x60, 0x40, 0x52]);
    }

    #[test]
    fn test_loads_foundry_artifact() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "ERC1967Proxy.sol/ERC1967Proxy.json",
            r#"{"abi":[],"bytecode":{"object":"0x60806040","linkReferences":{}}}"#,
        );

        let artifact = FsArtifactStore::new(dir.path()).load("ERC1967Proxy").unwrap();

        assert_eq!(artifact.contract_name, "ERC1967Proxy");
        assert_eq!(artifact.bytecode.len(), 4);
    }

    #[test]
    fn test_missing_and_ambiguous_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{"abi":[],"bytecode":"0x00"}"#;
        write(dir.path(), "a/Token.sol/Token.json", body);
        write(dir.path(), "b/Token.sol/Token.json", body);
        let store = FsArtifactStore::new(dir.path());

        assert!(store.load("Missing").unwrap_err().to_string().contains("no artifact"));
        assert!(store.load("Token").unwrap_err().to_string().contains("multiple artifacts"));
    }

    #[test]
    fn test_unlinked_library_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "Linked.json",
            r#"{"abi":[],"bytecode":"0x73__$1234567890abcdef1234567890abcdef12$__63"}"#,
        );

        let err = FsArtifactStore::new(dir.path()).load("Linked").unwrap_err();
        assert!(err.to_string().contains("unlinked"));
    }
}
