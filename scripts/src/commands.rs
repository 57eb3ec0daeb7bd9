//! Implementations of the deploy script commands

use std::{path::PathBuf, time::Duration};

use tracing::{info, warn};

use crate::{
    artifacts::{ArtifactStore, FsArtifactStore},
    chain::AlloyConnector,
    cli::{DeployArgs, HistoryArgs},
    config::{DeployConfig, DeploySettings},
    deployer::{DeployOptions, Deployer},
    errors::DeployError,
    journal::DeploymentJournal,
    types::{DeployedImplementation, DeploymentRecord, DeploymentStage},
};

/// Deploy a contract behind a new proxy and print the proxy address
pub async fn deploy(args: DeployArgs, config: &DeployConfig) -> Result<(), DeployError> {
    let settings = &config.deploy;
    let contract = args.contract.clone().or_else(|| settings.contract.clone()).ok_or_else(|| {
        DeployError::Configuration(
            "no contract to deploy; pass --contract or set `deploy.contract`".to_string(),
        )
    })?;
    let network = config.profile(&args.network)?;

    let journal = journal(args.deployments.clone(), settings);
    let latest = journal.latest(&args.network, &contract)?;
    let resume_from = check_previous(latest.as_ref(), &args)?;

    let store = FsArtifactStore::new(
        args.artifacts.clone().unwrap_or_else(|| PathBuf::from(&settings.artifacts_dir)),
    );
    let artifact = store.load(&contract)?;
    let proxy = store.load(&settings.proxy_contract)?;

    let deployer = Deployer::new(AlloyConnector, proxy, deploy_options(&args, settings))
        .with_journal(journal);
    let result = match resume_from {
        Some(implementation) => {
            deployer
                .resume_upgradeable_proxy(&artifact, &network, &args.init_args, implementation)
                .await?
        }
        None => deployer.deploy_upgradeable_proxy(&artifact, &network, &args.init_args).await?,
    };

    info!(
        network = %network.name,
        contract = %contract,
        proxy = %result.proxy_address(),
        implementation = %result.implementation_address(),
        tx = %result.transaction_hash(),
        confirmations = result.block_confirmations(),
        "deployment complete"
    );
    println!("{}", result.proxy_address());

    Ok(())
}

/// Print the journal, optionally restricted to one network
pub fn history(args: HistoryArgs, config: &DeployConfig) -> Result<(), DeployError> {
    let journal = journal(args.deployments, &config.deploy);
    let records = match &args.network {
        Some(network) => journal.history(network)?,
        None => journal.records()?,
    };

    for record in &records {
        println!("{}", describe(record));
    }

    Ok(())
}

/// The journal named on the command line, or the configured one
fn journal(path: Option<PathBuf>, settings: &DeploySettings) -> DeploymentJournal {
    DeploymentJournal::new(path.unwrap_or_else(|| PathBuf::from(&settings.deployments_file)))
}

/// Command-line overrides applied to the configured tunables
fn deploy_options(args: &DeployArgs, settings: &DeploySettings) -> DeployOptions {
    DeployOptions {
        confirmations: args.confirmations.unwrap_or(settings.confirmations),
        max_wait: args.timeout.map(Duration::from_secs).unwrap_or_else(|| settings.timeout()),
        poll_interval: settings.poll_interval(),
        initializer: args.initializer.clone().unwrap_or_else(|| settings.initializer.clone()),
    }
}

/// Decide, from the latest journal entry for the contract on the network,
/// whether to deploy afresh, resume, or refuse
fn check_previous(
    latest: Option<&DeploymentRecord>,
    args: &DeployArgs,
) -> Result<Option<DeployedImplementation>, DeployError> {
    let nothing_to_resume = || {
        DeployError::Configuration(format!(
            "no interrupted deployment to resume on {}",
            args.network
        ))
    };

    let Some(record) = latest else {
        return if args.resume { Err(nothing_to_resume()) } else { Ok(None) };
    };

    match &record.stage {
        DeploymentStage::ImplementationDeployed { implementation_address, transaction_hash }
            if args.resume =>
        {
            Ok(Some(DeployedImplementation {
                address: *implementation_address,
                transaction_hash: *transaction_hash,
            }))
        }
        DeploymentStage::ImplementationDeployed { implementation_address, .. } if !args.force => {
            Err(DeployError::Configuration(format!(
                "an earlier deployment of {} on {} stopped after its implementation {}; pass \
                 --resume to finish it or --force to start over",
                record.contract, args.network, implementation_address
            )))
        }
        DeploymentStage::Completed(result) if !args.force => {
            Err(DeployError::Configuration(format!(
                "{} is already deployed on {} behind proxy {}; pass --force to deploy again",
                record.contract,
                args.network,
                result.proxy_address()
            )))
        }
        _ if args.resume => Err(nothing_to_resume()),
        _ => {
            warn!(network = %args.network, contract = %record.contract, "ignoring earlier deployment");
            Ok(None)
        }
    }
}

/// A one-line rendering of a journal record
fn describe(record: &DeploymentRecord) -> String {
    let prefix = format!(
        "{} {} (chain {}) {}",
        record.recorded_at.to_rfc3339(),
        record.network,
        record.chain_id,
        record.contract
    );

    match &record.stage {
        DeploymentStage::ImplementationDeployed { implementation_address, transaction_hash } => {
            format!(
                "{prefix}: implementation {implementation_address} (tx {transaction_hash}), proxy pending"
            )
        }
        DeploymentStage::Completed(result) => format!(
            "{prefix}: proxy {} -> implementation {} (tx {}, {} confirmations)",
            result.proxy_address(),
            result.implementation_address(),
            result.transaction_hash(),
            result.block_confirmations()
        ),
    }
}
