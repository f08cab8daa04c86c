//! CMDB server: command-line entry point for schema bootstrap and the
//! tenant batch jobs.

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use cmdb_core::models::topology::{TopologyQuery, TraversalDirection};
use cmdb_db::repository::{
    SurrealAttributeGroupRepository, SurrealAttributeRepository, SurrealBindingRuleRepository,
    SurrealInstanceRelationRepository, SurrealInstanceRepository, SurrealModelGroupRepository,
    SurrealModelRelationTypeRepository, SurrealModelRepository, SurrealResourceBindingRepository,
    SurrealServiceTreeNodeRepository,
};
use cmdb_db::{DbConfig, DbManager};
use cmdb_engine::{EngineConfig, RelationService, RuleEngine, SchemaService, TopologyService};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    /// Node count at which instance topology traversal stops
    #[arg(long, default_value_t = 10_000, env = "CMDB_MAX_TOPOLOGY_NODES")]
    max_topology_nodes: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct DbArgs {
    /// SurrealDB endpoint: ws://host:port, a bare host:port, or mem://
    #[arg(long, default_value = "ws://127.0.0.1:8000", env = "CMDB_DB_URL")]
    db_url: String,

    #[arg(long, default_value = "cmdb", env = "CMDB_DB_NAMESPACE")]
    db_namespace: String,

    #[arg(long, default_value = "main", env = "CMDB_DB_DATABASE")]
    db_database: String,

    #[arg(long, default_value = "root", env = "CMDB_DB_USERNAME")]
    db_username: String,

    #[arg(long, default_value = "root", env = "CMDB_DB_PASSWORD", hide_env_values = true)]
    db_password: String,
}

impl From<DbArgs> for DbConfig {
    fn from(args: DbArgs) -> Self {
        Self {
            url: args.db_url,
            namespace: args.db_namespace,
            database: args.db_database,
            username: args.db_username,
            password: args.db_password,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending schema migrations, seed the builtin model groups and exit
    Migrate,

    /// Derive instance relations from matching attributes
    SyncRelations {
        #[arg(long)]
        tenant: Uuid,
    },

    /// Bind unbound instances to service tree nodes using the enabled rules
    ExecuteRules {
        #[arg(long)]
        tenant: Uuid,
    },

    /// Print the instance topology around a seed instance
    Topology {
        #[arg(long)]
        tenant: Uuid,

        #[arg(long)]
        instance: Uuid,

        /// Maximum hop distance; 0 or less is unbounded
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        depth: i32,

        /// both, outgoing or incoming
        #[arg(long, default_value = "both")]
        direction: TraversalDirection,

        /// Only include instances of this model
        #[arg(long)]
        model: Option<String>,
    },

    /// Print the model-level topology, optionally for one provider
    ModelTopology {
        #[arg(long, default_value = "")]
        provider: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), BoxError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    let config = EngineConfig {
        max_topology_nodes: cli.max_topology_nodes,
        ..Default::default()
    };

    let manager = DbManager::connect(&cli.db.into()).await?;
    let db = manager.client().clone();
    cmdb_db::run_migrations(&db).await?;

    match cli.command {
        Command::Migrate => {
            let schema = SchemaService::new(
                SurrealModelRepository::new(db.clone()),
                SurrealModelGroupRepository::new(db.clone()),
                SurrealAttributeRepository::new(db.clone()),
                SurrealAttributeGroupRepository::new(db.clone()),
                SurrealModelRelationTypeRepository::new(db.clone()),
            );
            let groups = schema.init_builtin_model_groups().await?;
            info!(model_groups = groups.len(), "Schema is up to date");
        }
        Command::SyncRelations { tenant } => {
            let service = RelationService::new(
                SurrealInstanceRepository::new(db.clone()),
                SurrealInstanceRelationRepository::new(db.clone()),
                SurrealModelRelationTypeRepository::new(db.clone()),
                config,
            );
            print_json(&service.sync_relations(tenant).await?)?;
        }
        Command::ExecuteRules { tenant } => {
            let engine = RuleEngine::new(
                SurrealServiceTreeNodeRepository::new(db.clone()),
                SurrealBindingRuleRepository::new(db.clone()),
                SurrealResourceBindingRepository::new(db.clone()),
                SurrealInstanceRepository::new(db.clone()),
                config,
            );
            print_json(&engine.execute_rules(tenant).await?)?;
        }
        Command::Topology {
            tenant,
            instance,
            depth,
            direction,
            model,
        } => {
            let service = topology_service(&db, config);
            let graph = service
                .get_instance_topology(TopologyQuery {
                    instance_id: instance,
                    model_uid: model,
                    tenant_id: tenant,
                    depth,
                    direction,
                })
                .await?;
            print_json(&graph)?;
        }
        Command::ModelTopology { provider } => {
            let service = topology_service(&db, config);
            print_json(&service.get_model_topology(&provider).await?)?;
        }
    }

    Ok(())
}

fn topology_service<C: surrealdb::Connection>(
    db: &surrealdb::Surreal<C>,
    config: EngineConfig,
) -> TopologyService<
    SurrealInstanceRepository<C>,
    SurrealInstanceRelationRepository<C>,
    SurrealModelRelationTypeRepository<C>,
    SurrealModelRepository<C>,
> {
    TopologyService::new(
        SurrealInstanceRepository::new(db.clone()),
        SurrealInstanceRelationRepository::new(db.clone()),
        SurrealModelRelationTypeRepository::new(db.clone()),
        SurrealModelRepository::new(db.clone()),
        config,
    )
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cmdb=info,cmdb_db=info,cmdb_engine=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}
