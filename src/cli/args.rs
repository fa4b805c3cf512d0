use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

use crate::api::EntityKind;
use crate::features::image::AspectRatio;

#[derive(Parser)]
#[command(name = "catalog-sync")]
#[command(about = "Offline-tolerant writes against a product catalog API")]
#[command(long_about = "catalog-sync - offline-tolerant catalog writes

Creates, updates and deletes catalog entities (products, users, roles,
categories). When the API is reachable the write is sent immediately and
cached responses for that resource are invalidated; otherwise the write is
stored in a durable local queue and replayed later with 'queue run'.

QUICK START:
  catalog-sync create product -f nombre=Lamp -f precio=10.00
  catalog-sync create product -f nombre=Lamp -f precio=10 --image lamp.png --aspect four-three
  catalog-sync update product 7 -f precio=12.5
  catalog-sync delete product pending:<ref>
  catalog-sync queue run

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    ///
    /// Defaults to the `general.default_output` setting.
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Treat the API as unreachable: every write is queued
    #[arg(long, global = true, conflicts_with = "online")]
    pub offline: bool,

    /// Treat the API as reachable without probing
    #[arg(long, global = true)]
    pub online: bool,

    /// Data directory (config, database, previews)
    #[arg(long, env = "CATALOG_SYNC_HOME", global = true)]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Connectivity forced from the command line, if any.
    #[must_use]
    pub const fn connectivity_override(&self) -> Option<bool> {
        if self.offline {
            Some(false)
        } else if self.online {
            Some(true)
        } else {
            None
        }
    }
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an entity
    ///
    /// Field values are parsed as JSON when possible (numbers, booleans,
    /// arrays) and sent as strings otherwise.
    ///
    /// # Examples
    ///
    ///   catalog-sync create product -f nombre=Lamp -f precio=10.00
    ///   catalog-sync create role -f nombre=Admin
    ///   catalog-sync create product -f nombre=Lamp -f precio=10 --image lamp.jpg
    #[command(alias = "c")]
    Create(CreateArgs),

    /// Update an entity by server id or pending:<ref>
    ///
    /// # Examples
    ///
    ///   catalog-sync update product 7 -f precio=12.5
    ///   catalog-sync update product pending:3f0c... -f nombre="Desk lamp"
    #[command(alias = "u")]
    Update(UpdateArgs),

    /// Delete an entity by server id or pending:<ref>
    ///
    /// A 409 from the API means the entity still has dependent records.
    #[command(alias = "rm")]
    Delete {
        /// Entity kind
        #[arg(value_enum)]
        kind: EntityKind,

        /// Server id, or pending:<ref> for a create still in the queue
        id: String,
    },

    /// List entities (served from the response cache when possible)
    #[command(alias = "ls")]
    List {
        /// Entity kind
        #[arg(value_enum)]
        kind: EntityKind,

        /// Bypass the cache and fetch from the API
        #[arg(long)]
        refresh: bool,
    },

    /// Show one entity (served from the response cache when possible)
    Show {
        /// Entity kind
        #[arg(value_enum)]
        kind: EntityKind,

        /// Server id
        id: String,

        /// Bypass the cache and fetch from the API
        #[arg(long)]
        refresh: bool,
    },

    /// Inspect and replay the offline operation queue
    Queue(QueueArgs),

    /// Inspect and invalidate the local response cache
    Cache(CacheArgs),

    /// Normalize images without sending them
    Image(ImageArgs),

    /// Generate shell completion scripts
    ///
    /// # Examples
    ///
    ///   catalog-sync completions bash > ~/.bash_completion.d/catalog-sync
    ///   catalog-sync completions zsh > ~/.zfunc/_catalog-sync
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Image to normalize and attach.
#[derive(Args, Debug, Clone, Default)]
pub struct ImageOptions {
    /// Image file (JPEG, PNG or WEBP, at most 5 MiB by default)
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Aspect ratio of the crop (defaults to `image.default_aspect`)
    #[arg(long, value_enum)]
    pub aspect: Option<AspectRatio>,

    /// Crop rectangle `x,y,width,height` in display units
    ///
    /// Without it the centered initial crop is used.
    #[arg(long)]
    pub crop: Option<String>,

    /// Display size `WIDTHxHEIGHT` the crop is expressed in
    ///
    /// Defaults to the image's natural size.
    #[arg(long)]
    pub display: Option<String>,
}

/// Arguments for create.
#[derive(Args)]
pub struct CreateArgs {
    /// Entity kind
    #[arg(value_enum)]
    pub kind: EntityKind,

    /// Field as key=value (repeatable)
    #[arg(short = 'f', long = "field", value_name = "KEY=VALUE")]
    pub fields: Vec<String>,

    #[command(flatten)]
    pub image: ImageOptions,
}

/// Arguments for update.
#[derive(Args)]
pub struct UpdateArgs {
    /// Entity kind
    #[arg(value_enum)]
    pub kind: EntityKind,

    /// Server id, or pending:<ref> for a create still in the queue
    pub id: String,

    /// Field as key=value (repeatable)
    #[arg(short = 'f', long = "field", value_name = "KEY=VALUE")]
    pub fields: Vec<String>,

    #[command(flatten)]
    pub image: ImageOptions,
}

/// Arguments for the operation queue.
#[derive(Args)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommands,
}

/// Operation queue subcommands.
#[derive(Subcommand)]
pub enum QueueCommands {
    /// Show queue status
    Status,

    /// List queued operations, oldest first
    List {
        /// Maximum operations to show
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Replay queued operations against the API
    ///
    /// Operations are sent in the order they were queued. Successful ones are
    /// removed; failed ones stay queued unchanged.
    Run {
        /// Keep going after a rejected operation
        #[arg(long)]
        continue_on_error: bool,

        /// Dry run - show what would be sent
        #[arg(long)]
        dry_run: bool,

        /// Maximum operations to replay
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Remove one queued operation without sending it
    Remove {
        /// Operation id
        id: i64,
    },

    /// Drop every queued operation and pending reference
    Clear {
        /// Required: queued writes are lost
        #[arg(long)]
        force: bool,
    },
}

/// Arguments for the response cache.
#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

/// Response cache subcommands.
#[derive(Subcommand)]
pub enum CacheCommands {
    /// List cached responses by partition
    List,

    /// Delete cached responses whose URL contains a marker
    ///
    /// An entity kind (product, user, role, category) stands for its
    /// resource marker, e.g. `product` -> `/productos/`.
    Invalidate {
        /// Entity kind or URL substring
        marker: String,
    },
}

/// Arguments for image tools.
#[derive(Args)]
pub struct ImageArgs {
    #[command(subcommand)]
    pub command: ImageCommands,
}

/// Image subcommands.
#[derive(Subcommand)]
pub enum ImageCommands {
    /// Crop and render an image to the fixed output size
    ///
    /// # Examples
    ///
    ///   catalog-sync image crop photo.png --out product.jpg
    ///   catalog-sync image crop photo.jpg --aspect four-three --display 600x400 --crop 50,20,400,300 --out p.jpg
    Crop {
        /// Source image
        path: PathBuf,

        /// Where to write the rendered JPEG
        #[arg(long)]
        out: PathBuf,

        /// Aspect ratio of the crop (defaults to `image.default_aspect`)
        #[arg(long, value_enum)]
        aspect: Option<AspectRatio>,

        /// Crop rectangle `x,y,width,height` in display units
        #[arg(long)]
        crop: Option<String>,

        /// Display size `WIDTHxHEIGHT` the crop is expressed in
        #[arg(long)]
        display: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "catalog-sync",
            "--offline",
            "create",
            "product",
            "-f",
            "nombre=Lamp",
            "-f",
            "precio=10.00",
        ])
        .unwrap();

        assert_eq!(cli.connectivity_override(), Some(false));
        match cli.command {
            Commands::Create(args) => {
                assert_eq!(args.kind, EntityKind::Product);
                assert_eq!(args.fields, vec!["nombre=Lamp", "precio=10.00"]);
                assert!(args.image.image.is_none());
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_offline_and_online_conflict() {
        assert!(Cli::try_parse_from(["catalog-sync", "--offline", "--online", "queue", "status"]).is_err());
    }
}
