use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "filomat",
    about = "Filomat: NFC-tagged filament inventory",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Config file (defaults to ./filomat.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Inventory file, overriding `data_path` from the config
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the inventory file and the standard containers
    Init(InitArgs),
    /// Manage containers
    Container(ContainerArgs),
    /// Manage items
    Item(ItemArgs),
    /// Encode, decode, and write tags
    Tag(TagArgs),
    /// Run a two-step scan against tag images
    Scan(ScanArgs),
    /// Look up filament presets
    Preset(PresetArgs),
    /// Check the inventory for consistency problems
    Check(CheckArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Also write a default config file
    #[arg(long)]
    pub write_config: bool,
}

#[derive(Args)]
pub struct CheckArgs {}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ContainerArgs {
    #[command(subcommand)]
    pub action: ContainerAction,
}

#[derive(Subcommand)]
pub enum ContainerAction {
    Add {
        tag: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        capacity: Option<u32>,
        /// Write the new container's tag to this tag image
        #[arg(long)]
        image: Option<PathBuf>,
    },
    List,
    /// Show a container by id, tag, or name
    Show { container: String },
    Edit {
        container: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        capacity: Option<u32>,
    },
    /// Delete a container; its items move to Loose
    Rm { container: String },
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ItemArgs {
    #[command(subcommand)]
    pub action: ItemAction,
}

#[derive(Subcommand)]
pub enum ItemAction {
    Add {
        tag: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        container: Option<String>,
        #[command(flatten)]
        metadata: MetadataArgs,
    },
    List {
        #[arg(long)]
        container: Option<String>,
        /// Only items without a container
        #[arg(long, conflicts_with = "container")]
        unassigned: bool,
    },
    /// Show an item by id or tag
    Show { item: String },
    Edit {
        item: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[command(flatten)]
        metadata: MetadataArgs,
    },
    Rm { item: String },
    /// Put an item into a container
    Assign { item: String, container: String },
    /// Move an item between containers
    Move {
        item: String,
        container: String,
        #[arg(long)]
        from: Option<String>,
    },
    /// Take an item out of a container
    Unassign { item: String, container: String },
}

#[derive(Args, Clone, Debug, Default)]
pub struct MetadataArgs {
    #[arg(long = "type")]
    pub material: Option<String>,
    #[arg(long)]
    pub brand: Option<String>,
    #[arg(long)]
    pub variant: Option<String>,
    #[arg(long)]
    pub color_hex: Option<String>,
    #[arg(long = "color")]
    pub color_name: Option<String>,
    #[arg(long)]
    pub min_temp: Option<String>,
    #[arg(long)]
    pub max_temp: Option<String>,
    #[arg(long)]
    pub bed_min_temp: Option<String>,
    #[arg(long)]
    pub bed_max_temp: Option<String>,
    /// Fill unset temperatures from the preset for the type and brand
    #[arg(long)]
    pub preset: bool,
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct TagArgs {
    #[command(subcommand)]
    pub action: TagAction,
}

#[derive(Subcommand)]
pub enum TagAction {
    /// Print the payload and NDEF bytes for metadata
    Encode {
        #[command(flatten)]
        metadata: MetadataArgs,
        /// Fill protocol/version and emit absent fields as null
        #[arg(long)]
        emit_defaults: bool,
    },
    /// Decode a tag image
    Decode { image: PathBuf },
    /// Write an item's or container's tag, then read it back
    Write {
        image: PathBuf,
        #[arg(long, conflicts_with = "container", required_unless_present = "container")]
        item: Option<String>,
        #[arg(long)]
        container: Option<String>,
    },
    /// Create a tag image
    New {
        image: PathBuf,
        /// Hardware id as hex
        #[arg(long)]
        hardware_id: String,
        #[arg(long, default_value = "ndef")]
        kind: TagKindArg,
        #[arg(long, default_value = "504")]
        max_size: usize,
        #[arg(long)]
        read_only: bool,
        /// Store a plain text record
        #[arg(long)]
        text: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum TagKindArg {
    Ndef,
    Formatable,
    Unsupported,
}

// ---------------------------------------------------------------------------
// Scans
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ScanArgs {
    #[command(subcommand)]
    pub action: ScanAction,
}

#[derive(Subcommand)]
pub enum ScanAction {
    /// Scan a container, then items to put into it
    Add {
        #[arg(required = true, num_args = 2..)]
        images: Vec<PathBuf>,
        /// Move items that sit in another container instead of skipping them
        #[arg(short, long)]
        yes: bool,
    },
    /// Scan an item, then the container to take it out of
    Remove {
        #[arg(required = true, num_args = 2..)]
        images: Vec<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct PresetArgs {
    #[command(subcommand)]
    pub action: PresetAction,
}

#[derive(Subcommand)]
pub enum PresetAction {
    Show {
        material: String,
        #[arg(long)]
        brand: Option<String>,
    },
    Brands,
    Variants,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["filomat", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init(_)));
    }

    #[test]
    fn parse_container_add() {
        let cli = Cli::try_parse_from(["filomat", "container", "add", "BOX1", "Box 1", "--capacity", "8"]).unwrap();
        if let Command::Container(args) = cli.command {
            if let ContainerAction::Add { tag, name, capacity, .. } = args.action {
                assert_eq!(tag, "BOX1");
                assert_eq!(name, "Box 1");
                assert_eq!(capacity, Some(8));
            } else { panic!("wrong action"); }
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_item_add_with_metadata() {
        let cli = Cli::try_parse_from([
            "filomat", "item", "add", "AA11", "--type", "PLA", "--brand", "Elegoo", "--color", "Red", "--preset",
        ])
        .unwrap();
        if let Command::Item(args) = cli.command {
            if let ItemAction::Add { tag, metadata, .. } = args.action {
                assert_eq!(tag, "AA11");
                assert_eq!(metadata.material, Some("PLA".into()));
                assert_eq!(metadata.color_name, Some("Red".into()));
                assert!(metadata.preset);
            } else { panic!("wrong action"); }
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_item_move() {
        let cli = Cli::try_parse_from(["filomat", "item", "move", "AA11", "BOX2", "--from", "BOX1"]).unwrap();
        if let Command::Item(args) = cli.command {
            assert!(matches!(args.action, ItemAction::Move { from: Some(_), .. }));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn item_list_filters_conflict() {
        assert!(Cli::try_parse_from(["filomat", "item", "list", "--container", "x", "--unassigned"]).is_err());
    }

    #[test]
    fn tag_write_needs_a_target() {
        assert!(Cli::try_parse_from(["filomat", "tag", "write", "t.json"]).is_err());
        assert!(Cli::try_parse_from(["filomat", "tag", "write", "t.json", "--item", "a", "--container", "b"]).is_err());
        assert!(Cli::try_parse_from(["filomat", "tag", "write", "t.json", "--container", "b"]).is_ok());
    }

    #[test]
    fn parse_tag_new() {
        let cli = Cli::try_parse_from([
            "filomat", "tag", "new", "t.json", "--hardware-id", "04a1b2", "--kind", "formatable",
        ])
        .unwrap();
        if let Command::Tag(args) = cli.command {
            if let TagAction::New { kind, max_size, read_only, .. } = args.action {
                assert_eq!(kind, TagKindArg::Formatable);
                assert_eq!(max_size, 504);
                assert!(!read_only);
            } else { panic!("wrong action"); }
        } else { panic!("wrong command"); }
    }

    #[test]
    fn scan_needs_two_images() {
        assert!(Cli::try_parse_from(["filomat", "scan", "add", "box.json"]).is_err());
        let cli = Cli::try_parse_from(["filomat", "scan", "add", "-y", "box.json", "spool.json"]).unwrap();
        if let Command::Scan(args) = cli.command {
            if let ScanAction::Add { images, yes } = args.action {
                assert_eq!(images.len(), 2);
                assert!(yes);
            } else { panic!("wrong action"); }
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_preset_show() {
        let cli = Cli::try_parse_from(["filomat", "preset", "show", "PETG", "--brand", "Sunlu"]).unwrap();
        assert!(matches!(cli.command, Command::Preset(_)));
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from(["filomat", "check", "--verbose", "--format", "json", "--data", "inv.json"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.data, Some(PathBuf::from("inv.json")));
    }
}
