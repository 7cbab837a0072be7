use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context as _};
use colored::Colorize;
use filomat_presets::PresetLookup;
use filomat_scan::{
    cancel_pair, write_then_verify, CancelToken, RadioMode, RadioSession, ScanError, ScanEvent,
    ScanMode, ScanOutcome, ScanSession, ScanState, ScanWarning, SimulatedRadio,
};
use filomat_store::{ContainerRemoval, InventoryStore, ItemInsert};
use filomat_tag::{
    container_message, decode_tag, encode_metadata, metadata_message, read_tag, ContainerTagData,
    DecodedTag, NdefMessage, NdefRecord, SimulatedTag, TagContent, TagDevice,
};
use filomat_types::{Container, ContainerId, FilamentMetadata, Item, ItemId};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::cli::*;
use crate::config::{FilomatConfig, CONFIG_FILE};

pub struct Context {
    pub config: FilomatConfig,
    pub format: OutputFormat,
}

impl Context {
    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn open_store(&self) -> anyhow::Result<InventoryStore> {
        let path = &self.config.data_path;
        let store = InventoryStore::open_file(path)
            .with_context(|| format!("opening inventory {}", path.display()))?;
        for diagnostic in store.diagnostics() {
            eprintln!("{} {}", "warning:".yellow().bold(), diagnostic);
        }
        Ok(store)
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = FilomatConfig::load(cli.config.as_deref())?;
    if let Some(data) = cli.data {
        config.data_path = data;
    }
    let ctx = Context {
        config,
        format: cli.format,
    };

    match cli.command {
        Command::Init(args) => cmd_init(&ctx, args),
        Command::Container(args) => {
            let tag_image = match &args.action {
                ContainerAction::Add { tag, image: Some(image), .. } => Some((tag.clone(), image.clone())),
                _ => None,
            };
            cmd_container(&ctx, args.action)?;
            match tag_image {
                Some((tag, image)) => {
                    let write = TagAction::Write {
                        image,
                        item: None,
                        container: Some(tag),
                    };
                    cmd_tag(&ctx, write).await
                }
                None => Ok(()),
            }
        }
        Command::Item(args) => cmd_item(&ctx, args.action),
        Command::Tag(args) => cmd_tag(&ctx, args.action).await,
        Command::Scan(args) => cmd_scan(&ctx, args.action).await,
        Command::Preset(args) => cmd_preset(&ctx, args.action),
        Command::Check(_) => cmd_check(&ctx),
    }
}

fn cmd_init(ctx: &Context, args: InitArgs) -> anyhow::Result<()> {
    let config_path = Path::new(CONFIG_FILE);
    if args.write_config && config_path.exists() {
        bail!("{CONFIG_FILE} already exists");
    }

    let path = &ctx.config.data_path;
    let existed = path.exists();
    let store = ctx.open_store()?;
    if args.write_config {
        fs::write(config_path, ctx.config.to_toml()?)?;
    }

    let containers = store.containers();
    if ctx.json() {
        return emit_json(&containers);
    }
    if existed {
        println!("Inventory {} already initialized", path.display().to_string().bold());
    } else {
        println!("{} Initialized inventory in {}", "✓".green().bold(), path.display().to_string().bold());
    }
    for container in containers.iter().filter(|c| c.is_standard) {
        println!("  {}", container_line(container));
    }
    if args.write_config {
        println!("  Config: {}", CONFIG_FILE.cyan());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

fn cmd_container(ctx: &Context, action: ContainerAction) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    match action {
        ContainerAction::Add { tag, name, description, capacity, .. } => {
            if let Some(existing) = store.find_container_by_tag(&tag) {
                bail!("tag {tag} is already bound to container {}", existing.name);
            }
            let mut container = Container::new(tag, name);
            if let Some(description) = description {
                container = container.with_description(description);
            }
            if let Some(capacity) = capacity {
                container = container.with_capacity(capacity);
            }
            store.add_container(container.clone())?;
            if ctx.json() {
                return emit_json(&container);
            }
            println!("{} Created container {}", "✓".green().bold(), container_line(&container));
        }
        ContainerAction::List => {
            let containers = store.containers();
            if ctx.json() {
                return emit_json(&containers);
            }
            for container in &containers {
                println!("{}", container_line(container));
            }
        }
        ContainerAction::Show { container } => {
            let container = find_container(&store, &container)?;
            if ctx.json() {
                return emit_json(&container);
            }
            println!("{}", container_line(&container));
            if !container.description.is_empty() {
                println!("  {}", container.description);
            }
            println!("  Created: {}", container.created_at);
            let containers = store.containers();
            if container.items.is_empty() {
                println!("  {}", "empty".dimmed());
            }
            for item in &container.items {
                println!("  - {}", item_line(item, &containers));
            }
        }
        ContainerAction::Edit { container, name, tag, description, capacity } => {
            let mut container = find_container(&store, &container)?;
            if let Some(tag) = tag {
                if let Some(other) = store.find_container_by_tag(&tag) {
                    if other.id != container.id {
                        bail!("tag {tag} is already bound to container {}", other.name);
                    }
                }
                container.tag_id = tag;
            }
            if let Some(name) = name {
                container.name = name;
            }
            if let Some(description) = description {
                container.description = description;
            }
            if capacity.is_some() {
                container.capacity = capacity;
            }
            store.update_container(container.clone())?;
            if ctx.json() {
                return emit_json(&container);
            }
            println!("{} Updated container {}", "✓".green().bold(), container_line(&container));
        }
        ContainerAction::Rm { container } => {
            let container = find_container(&store, &container)?;
            match store.remove_container(&container.id)? {
                ContainerRemoval::Removed { reassigned } => {
                    if ctx.json() {
                        return emit_json(&json!({ "removed": container.id, "reassigned": reassigned }));
                    }
                    println!("{} Deleted container {}", "✓".green().bold(), container.name.bold());
                    if !reassigned.is_empty() {
                        println!("  {} item(s) moved to Loose", reassigned.len());
                    }
                }
                ContainerRemoval::Protected => {
                    bail!("{} is a standard container and cannot be deleted", container.name)
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

fn cmd_item(ctx: &Context, action: ItemAction) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    match action {
        ItemAction::Add { tag, name, description, container, metadata } => {
            let metadata = resolve_metadata(ctx, &metadata, FilamentMetadata::default())?;
            let mut item = Item::from_entry(tag, (!metadata.is_empty()).then_some(metadata));
            if let Some(name) = name {
                item.name = name;
            }
            if let Some(description) = description {
                item.description = description;
            }
            if let Some(reference) = container {
                item = item.in_container(find_container(&store, &reference)?.id);
            }

            match store.add_item(item)? {
                ItemInsert::Created(item) => {
                    if ctx.json() {
                        return emit_json(&item);
                    }
                    println!("{} Created item {}", "✓".green().bold(), item_line(&item, &store.containers()));
                }
                ItemInsert::AlreadyBound(existing) => {
                    if ctx.json() {
                        return emit_json(&existing);
                    }
                    println!(
                        "{} Tag already bound to {}",
                        "!".yellow().bold(),
                        item_line(&existing, &store.containers())
                    );
                }
            }
        }
        ItemAction::List { container, unassigned } => {
            let items = match container {
                Some(reference) => store.items_of(&find_container(&store, &reference)?.id),
                None if unassigned => store.loose_items(),
                None => store.items(),
            };
            if ctx.json() {
                return emit_json(&items);
            }
            let containers = store.containers();
            for item in &items {
                println!("{}", item_line(item, &containers));
            }
        }
        ItemAction::Show { item } => {
            let item = find_item(&store, &item)?;
            if ctx.json() {
                return emit_json(&item);
            }
            println!("{}", item_line(&item, &store.containers()));
            if !item.description.is_empty() {
                println!("  {}", item.description);
            }
            println!("  Created: {}", item.created_at);
            if let Some(metadata) = &item.metadata {
                print_metadata(metadata);
            }
        }
        ItemAction::Edit { item, name, tag, description, metadata } => {
            let mut item = find_item(&store, &item)?;
            if let Some(tag) = tag {
                if let Some(other) = store.find_item_by_tag(&tag) {
                    if other.id != item.id {
                        bail!("tag {tag} is already bound to {}", other.display_title());
                    }
                }
                item.tag_id = tag;
            }
            if let Some(name) = name {
                item.name = name;
            }
            if let Some(description) = description {
                item.description = description;
            }
            let base = item.metadata.take().unwrap_or_default();
            let metadata = resolve_metadata(ctx, &metadata, base)?;
            item.metadata = (!metadata.is_empty()).then_some(metadata);

            let item = store.update_item(item)?;
            if ctx.json() {
                return emit_json(&item);
            }
            println!("{} Updated item {}", "✓".green().bold(), item_line(&item, &store.containers()));
        }
        ItemAction::Rm { item } => {
            let item = find_item(&store, &item)?;
            let removed = store.remove_item(&item.id)?;
            if ctx.json() {
                return emit_json(&removed);
            }
            println!("{} Deleted item {}", "✓".green().bold(), removed.display_title().bold());
        }
        ItemAction::Assign { item, container } => {
            let item = find_item(&store, &item)?;
            let container = find_container(&store, &container)?;
            let item = store.add_item_to_container(&item.id, &container.id)?;
            if ctx.json() {
                return emit_json(&item);
            }
            println!(
                "{} {} → {}",
                "✓".green().bold(),
                item.display_title().bold(),
                container.name.yellow()
            );
        }
        ItemAction::Move { item, container, from } => {
            let item = find_item(&store, &item)?;
            let to = find_container(&store, &container)?;
            let from = from.map(|r| find_container(&store, &r)).transpose()?;
            let item = store.move_item_to_container(&item.id, from.as_ref().map(|c| &c.id), &to.id)?;
            if ctx.json() {
                return emit_json(&item);
            }
            println!("{} {} → {}", "✓".green().bold(), item.display_title().bold(), to.name.yellow());
        }
        ItemAction::Unassign { item, container } => {
            let item = find_item(&store, &item)?;
            let container = find_container(&store, &container)?;
            if item.container_id.as_ref() != Some(&container.id) {
                bail!("{} is not in {}", item.display_title(), container.name);
            }
            let item = store.remove_item_from_container(&item.id, &container.id)?;
            if ctx.json() {
                return emit_json(&item);
            }
            println!(
                "{} {} removed from {}",
                "✓".green().bold(),
                item.display_title().bold(),
                container.name.yellow()
            );
        }
    }
    Ok(())
}

impl MetadataArgs {
    /// Overlay the given fields on `base`.
    fn apply_to(&self, base: FilamentMetadata) -> FilamentMetadata {
        let pick = |arg: &Option<String>, current: Option<String>| arg.clone().or(current);
        FilamentMetadata {
            material: pick(&self.material, base.material),
            brand: pick(&self.brand, base.brand),
            variant: pick(&self.variant, base.variant),
            color_hex: pick(&self.color_hex, base.color_hex),
            color_name: pick(&self.color_name, base.color_name),
            min_temp: pick(&self.min_temp, base.min_temp),
            max_temp: pick(&self.max_temp, base.max_temp),
            bed_min_temp: pick(&self.bed_min_temp, base.bed_min_temp),
            bed_max_temp: pick(&self.bed_max_temp, base.bed_max_temp),
            ..base
        }
    }
}

/// Apply `args` over `base`, fill temperatures from presets if asked, and
/// validate.
fn resolve_metadata(
    ctx: &Context,
    args: &MetadataArgs,
    base: FilamentMetadata,
) -> anyhow::Result<FilamentMetadata> {
    let mut metadata = args.apply_to(base).normalized();
    if args.preset {
        match metadata.material.clone() {
            Some(material) => {
                match ctx.config.presets().get_preset(&material, metadata.brand.as_deref()) {
                    Some(preset) => preset.fill(&mut metadata),
                    None => eprintln!("{} no preset for {material}", "warning:".yellow().bold()),
                }
            }
            None => eprintln!("{} --preset needs --type", "warning:".yellow().bold()),
        }
    }
    metadata.validate()?;
    Ok(metadata)
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

enum WriteTarget {
    Item(Item),
    Container(Container),
}

async fn cmd_tag(ctx: &Context, action: TagAction) -> anyhow::Result<()> {
    match action {
        TagAction::Encode { metadata, emit_defaults } => {
            let metadata = resolve_metadata(ctx, &metadata, FilamentMetadata::default())?;
            let mut options = ctx.config.encode_options();
            options.emit_defaults |= emit_defaults;
            let metadata = ctx.config.prepare(&metadata, options);

            let payload = encode_metadata(&metadata, options)?;
            let bytes = metadata_message(&metadata, options)?.encode()?;
            if ctx.json() {
                let payload: serde_json::Value = serde_json::from_slice(&payload)?;
                return emit_json(&json!({
                    "payload": payload,
                    "ndef": hex::encode_upper(&bytes),
                    "size": bytes.len(),
                }));
            }
            println!("{}", String::from_utf8_lossy(&payload));
            println!("{} {} bytes", "NDEF:".bold(), bytes.len());
            println!("{}", hex::encode_upper(&bytes).dimmed());
        }
        TagAction::Decode { image } => {
            let mut tag = load_image(&image)?;
            let decoded = read_tag(&mut tag);
            let (item, container) = if ctx.config.data_path.exists() {
                let store = ctx.open_store()?;
                (
                    store.find_item_by_tag(&decoded.identifier),
                    store.find_container_by_tag(&decoded.identifier),
                )
            } else {
                (None, None)
            };

            if ctx.json() {
                return emit_json(&json!({
                    "identifier": decoded.identifier,
                    "hardwareId": decoded.hardware_id,
                    "content": content_label(&decoded.content),
                    "metadata": decoded.metadata(),
                    "item": item.map(|i| i.id),
                    "container": container.map(|c| c.id),
                }));
            }
            println!("Identifier:  {}", decoded.identifier.cyan().bold());
            println!("Hardware id: {}", decoded.hardware_id);
            println!("Content:     {}", content_label(&decoded.content));
            if let Some(metadata) = decoded.metadata() {
                print_metadata(metadata);
            }
            match (item, container) {
                (Some(item), _) => println!("Item:        {}", item.display_title().bold()),
                (None, Some(container)) => println!("Container:   {}", container.name.bold()),
                (None, None) => println!("{}", "Not in inventory".dimmed()),
            }
        }
        TagAction::Write { image, item, container } => {
            let store = ctx.open_store()?;
            let options = ctx.config.encode_options();
            let (message, target) = match (item, container) {
                (Some(reference), _) => {
                    let item = find_item(&store, &reference)?;
                    let metadata = ctx.config.prepare(&item.metadata.clone().unwrap_or_default(), options);
                    metadata.validate()?;
                    (metadata_message(&metadata, options)?, WriteTarget::Item(item))
                }
                (None, Some(reference)) => {
                    let container = find_container(&store, &reference)?;
                    let data = ContainerTagData::from_container(&container);
                    (container_message(&data)?, WriteTarget::Container(container))
                }
                (None, None) => bail!("pass --item or --container"),
            };

            let tag = load_image(&image)?;
            // Refuse before touching the tag if the identifier it will carry
            // is bound elsewhere.
            let expected = decode_tag(tag.hardware_id(), Some(&message)).identifier;
            ensure_unbound(&store, &target, &expected)?;

            let radio = SimulatedRadio::new();
            let shared = radio.present(tag);
            // Presented again for the verifying read.
            radio.present_shared(shared.clone());

            let mut cancel = interrupt_token();
            let verified = write_then_verify(&radio, &message, ctx.config.settle(), &mut cancel)
                .await?
                .ok_or_else(|| anyhow!("write cancelled"))?;
            let written = shared
                .lock()
                .map_err(|_| anyhow!("tag image lock poisoned"))?
                .to_json()?;
            fs::write(&image, written).with_context(|| format!("saving {}", image.display()))?;

            let identifier = verified.tag.identifier.clone();
            let rebound = rebind(&store, target, &identifier)?;
            if ctx.json() {
                return emit_json(&json!({
                    "bytes": verified.report.bytes_written,
                    "formatted": verified.report.formatted,
                    "identifier": identifier,
                    "rebound": rebound,
                }));
            }
            let formatted = if verified.report.formatted { " (formatted)" } else { "" };
            println!("{} Wrote {} bytes{}", "✓".green().bold(), verified.report.bytes_written, formatted);
            println!("{} Verified tag {}", "✓".green().bold(), identifier.cyan());
            if let Some(name) = rebound {
                println!("  Bound {} to tag {}", name.bold(), identifier.cyan());
            }
        }
        TagAction::New { image, hardware_id, kind, max_size, read_only, text } => {
            let hardware = hex::decode(hardware_id.trim())
                .with_context(|| format!("invalid hardware id '{hardware_id}'"))?;
            if hardware.is_empty() {
                bail!("hardware id is empty");
            }
            let mut tag = match kind {
                TagKindArg::Ndef => SimulatedTag::ndef(hardware, max_size),
                TagKindArg::Formatable => SimulatedTag::formatable(hardware, max_size),
                TagKindArg::Unsupported => SimulatedTag::unsupported(hardware),
            };
            if read_only {
                tag = tag.read_only();
            }
            if let Some(text) = text {
                tag = tag.with_message(&NdefMessage::single(NdefRecord::text("en", &text)))?;
            }
            fs::write(&image, tag.to_json()?).with_context(|| format!("saving {}", image.display()))?;
            if !ctx.json() {
                println!("{} Created tag image {}", "✓".green().bold(), image.display().to_string().bold());
            }
        }
    }
    Ok(())
}

/// Fail if `identifier` is bound to something other than `target`.
fn ensure_unbound(store: &InventoryStore, target: &WriteTarget, identifier: &str) -> anyhow::Result<()> {
    match target {
        WriteTarget::Item(item) => {
            if let Some(other) = store.find_item_by_tag(identifier).filter(|o| o.id != item.id) {
                bail!("tag {identifier} is already bound to {}", other.display_title());
            }
        }
        WriteTarget::Container(container) => {
            if let Some(other) = store
                .find_container_by_tag(identifier)
                .filter(|o| o.id != container.id)
            {
                bail!("tag {identifier} is already bound to container {}", other.name);
            }
        }
    }
    Ok(())
}

/// Point the written entity at the tag's identifier. Returns its name if
/// the binding changed.
fn rebind(store: &InventoryStore, target: WriteTarget, identifier: &str) -> anyhow::Result<Option<String>> {
    ensure_unbound(store, &target, identifier)?;
    match target {
        WriteTarget::Item(item) if item.tag_id != identifier => {
            let name = item.display_title();
            store.update_item(Item {
                tag_id: identifier.to_string(),
                ..item
            })?;
            Ok(Some(name))
        }
        WriteTarget::Container(container) if container.tag_id != identifier => {
            let name = container.name.clone();
            store.update_container(Container {
                tag_id: identifier.to_string(),
                ..container
            })?;
            Ok(Some(name))
        }
        _ => Ok(None),
    }
}

fn content_label(content: &TagContent) -> String {
    match content {
        TagContent::Structured(_) => "filament metadata".into(),
        TagContent::MalformedJson { reason } => format!("malformed JSON ({reason})"),
        TagContent::Text => "text".into(),
        TagContent::Blank => "blank".into(),
    }
}

fn load_image(path: &Path) -> anyhow::Result<SimulatedTag> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading tag image {}", path.display()))?;
    Ok(SimulatedTag::from_json(&raw)?)
}

/// A token cancelled by Ctrl-C.
fn interrupt_token() -> CancelToken {
    let (handle, token) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupted");
            handle.cancel();
        }
    });
    token
}

// ---------------------------------------------------------------------------
// Scans
// ---------------------------------------------------------------------------

async fn cmd_scan(ctx: &Context, action: ScanAction) -> anyhow::Result<()> {
    let (mode, images, auto_confirm) = match action {
        ScanAction::Add { images, yes } => (ScanMode::AddToContainer, images, yes),
        ScanAction::Remove { images } => (ScanMode::RemoveFromContainer, images, false),
    };
    let store = ctx.open_store()?;
    let radio = SimulatedRadio::new();
    for image in &images {
        radio.present(load_image(image)?);
    }

    let mut cancel = interrupt_token();
    let mut session = ScanSession::new(mode);
    // In add mode the container stays selected for every following item.
    let mut anchor: Option<DecodedTag> = None;
    let mut outcomes = Vec::new();

    for _ in &images {
        if session.state() == ScanState::Idle {
            session.arm()?;
            if let Some(anchor) = &anchor {
                session.handle_tag(anchor, &store)?;
            }
        }

        let reader = RadioSession::acquire(&radio, RadioMode::Read)?;
        let Some(tag) = reader.read_one(&mut cancel).await? else {
            bail!("scan cancelled");
        };
        let first = session.state() == ScanState::AwaitingFirst;
        let event = match session.handle_tag(&tag, &store) {
            Ok(event) => event,
            Err(e @ ScanError::UnknownContainer { .. }) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if first && mode == ScanMode::AddToContainer {
            anchor = Some(tag);
        }
        if !ctx.json() {
            print_scan_event(&event, &store);
        }

        if let ScanEvent::ConfirmationRequired { .. } = event {
            if auto_confirm {
                session.confirm()?;
            } else {
                session.cancel()?;
                if !ctx.json() {
                    println!("  skipped; pass --yes to move it");
                }
            }
        }
        if session.state() == ScanState::Resolved {
            let outcome = session.commit(&store)?;
            if !ctx.json() {
                print_outcome(&outcome, &store);
            }
            outcomes.push(outcome);
        }
    }

    if session.state() != ScanState::Idle {
        eprintln!("{} scan ended while {}", "warning:".yellow().bold(), session.state());
    }
    if ctx.json() {
        let outcomes: Vec<serde_json::Value> = outcomes.iter().map(outcome_json).collect();
        return emit_json(&outcomes);
    }
    Ok(())
}

fn print_scan_event(event: &ScanEvent, store: &InventoryStore) {
    match event {
        ScanEvent::ContainerResolved(container) => {
            println!("  container {} {}", container.name.bold(), container.tag_id.cyan());
        }
        ScanEvent::ItemResolved { item, created } => {
            let new = if *created { " (new)".green().to_string() } else { String::new() };
            println!("  item {} {}{}", item.display_title().bold(), item.tag_id.cyan(), new);
        }
        ScanEvent::ConfirmationRequired { item, current } => {
            println!(
                "{} {} is in {}",
                "!".yellow().bold(),
                item.display_title().bold(),
                container_name(store, current).yellow()
            );
        }
        ScanEvent::Warning(ScanWarning::AlreadyInContainer { item }) => {
            println!("{} {} is already in this container", "!".yellow().bold(), item.display_title().bold());
        }
        ScanEvent::Warning(ScanWarning::NotInContainer { item, container }) => {
            println!(
                "{} {} is not in {}",
                "!".yellow().bold(),
                item.display_title().bold(),
                container.name.yellow()
            );
        }
    }
}

fn print_outcome(outcome: &ScanOutcome, store: &InventoryStore) {
    let tick = "✓".green().bold();
    match outcome {
        ScanOutcome::Added { item, container } => {
            println!("{tick} Added {} to {}", item.display_title().bold(), container_name(store, container).yellow());
        }
        ScanOutcome::Moved { item, from, to } => {
            println!(
                "{tick} Moved {} from {} to {}",
                item.display_title().bold(),
                container_name(store, from),
                container_name(store, to).yellow()
            );
        }
        ScanOutcome::Removed { item, container } => {
            println!(
                "{tick} Removed {} from {}",
                item.display_title().bold(),
                container_name(store, container).yellow()
            );
        }
    }
}

fn outcome_json(outcome: &ScanOutcome) -> serde_json::Value {
    match outcome {
        ScanOutcome::Added { item, container } => {
            json!({ "action": "added", "item": item.id, "container": container })
        }
        ScanOutcome::Moved { item, from, to } => {
            json!({ "action": "moved", "item": item.id, "from": from, "to": to })
        }
        ScanOutcome::Removed { item, container } => {
            json!({ "action": "removed", "item": item.id, "container": container })
        }
    }
}

// ---------------------------------------------------------------------------
// Presets and checks
// ---------------------------------------------------------------------------

fn cmd_preset(ctx: &Context, action: PresetAction) -> anyhow::Result<()> {
    let table = ctx.config.presets();
    match action {
        PresetAction::Show { material, brand } => {
            let preset = table
                .get_preset(&material, brand.as_deref())
                .ok_or_else(|| anyhow!("no preset for {material}"))?;
            if ctx.json() {
                return emit_json(&preset);
            }
            println!(
                "{} {}",
                preset.material.bold(),
                preset.brand.as_deref().unwrap_or("any brand").cyan()
            );
            println!("  Nozzle: {}-{} °C", preset.min_temp, preset.max_temp);
            if let Some(bed) = temp_range(&preset.bed_min_temp, &preset.bed_max_temp) {
                println!("  Bed:    {bed}");
            }
        }
        PresetAction::Brands => print_names(ctx, &table.list_brands(), "brands")?,
        PresetAction::Variants => print_names(ctx, &table.list_variants(), "variants")?,
    }
    Ok(())
}

fn print_names(ctx: &Context, names: &[String], what: &str) -> anyhow::Result<()> {
    if ctx.json() {
        return emit_json(names);
    }
    if names.is_empty() {
        println!("No {what} known.");
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn cmd_check(ctx: &Context) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let violations = store.check_invariants();
    if ctx.json() {
        emit_json(&json!({
            "diagnostics": store.diagnostics().iter().map(ToString::to_string).collect::<Vec<_>>(),
            "violations": violations.iter().map(ToString::to_string).collect::<Vec<_>>(),
        }))?;
    } else if violations.is_empty() {
        let snapshot = store.snapshot();
        println!("{} No issues.", "✓".green().bold());
        println!("  {} containers, {} items", snapshot.containers.len(), snapshot.items.len());
    } else {
        for violation in &violations {
            println!("  {} {}", "✗".red(), violation);
        }
    }

    if !violations.is_empty() {
        bail!("{} consistency problem(s) found", violations.len());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Lookup and formatting
// ---------------------------------------------------------------------------

/// Resolve a container by id, tag, or unique name.
fn find_container(store: &InventoryStore, reference: &str) -> anyhow::Result<Container> {
    if let Some(container) = store.container(&ContainerId::from(reference)) {
        return Ok(container);
    }
    if let Some(container) = store.find_container_by_tag(reference) {
        return Ok(container);
    }
    let mut named: Vec<Container> = store
        .containers()
        .into_iter()
        .filter(|c| c.name.eq_ignore_ascii_case(reference))
        .collect();
    match named.len() {
        0 => bail!("no container matches '{reference}'"),
        1 => Ok(named.remove(0)),
        n => bail!("'{reference}' names {n} containers; use the id or tag"),
    }
}

/// Resolve an item by id or tag.
fn find_item(store: &InventoryStore, reference: &str) -> anyhow::Result<Item> {
    store
        .item(&ItemId::from(reference))
        .or_else(|| store.find_item_by_tag(reference))
        .ok_or_else(|| anyhow!("no item matches '{reference}'"))
}

fn container_name(store: &InventoryStore, id: &ContainerId) -> String {
    store
        .container(id)
        .map(|c| c.name)
        .unwrap_or_else(|| id.to_string())
}

fn container_line(container: &Container) -> String {
    let count = match container.capacity {
        Some(capacity) => format!("{}/{}", container.items.len(), capacity),
        None => container.items.len().to_string(),
    };
    let standard = if container.is_standard {
        " standard".dimmed().to_string()
    } else {
        String::new()
    };
    format!(
        "{} {} [{} items]{}  {}",
        container.name.bold(),
        tag_label(&container.tag_id),
        count,
        standard,
        container.id.short_id().dimmed()
    )
}

fn item_line(item: &Item, containers: &[Container]) -> String {
    let place = match &item.container_id {
        Some(id) => containers
            .iter()
            .find(|c| &c.id == id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string()),
        None => "unassigned".to_string(),
    };
    format!(
        "{} {} in {}  {}",
        item.display_title().bold(),
        tag_label(&item.tag_id),
        place.yellow(),
        item.id.short_id().dimmed()
    )
}

fn tag_label(tag: &str) -> String {
    if tag.trim().is_empty() {
        "(no tag)".dimmed().to_string()
    } else {
        tag.cyan().to_string()
    }
}

fn print_metadata(metadata: &FilamentMetadata) {
    let rows = [
        ("Type", metadata.material.clone()),
        ("Brand", metadata.brand.clone()),
        ("Variant", metadata.variant.clone()),
        ("Color", metadata.color_name.clone()),
        ("Color hex", metadata.color_hex.clone()),
        ("Nozzle", temp_range(&metadata.min_temp, &metadata.max_temp)),
        ("Bed", temp_range(&metadata.bed_min_temp, &metadata.bed_max_temp)),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            println!("  {:<10} {}", format!("{label}:"), value);
        }
    }
}

fn temp_range(min: &Option<String>, max: &Option<String>) -> Option<String> {
    match (min, max) {
        (Some(min), Some(max)) => Some(format!("{min}-{max} °C")),
        (Some(min), None) => Some(format!("from {min} °C")),
        (None, Some(max)) => Some(format!("up to {max} °C")),
        (None, None) => None,
    }
}

fn emit_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filomat_types::StandardContainer;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn make_ctx(dir: &TempDir) -> Context {
        Context {
            config: FilomatConfig {
                data_path: dir.path().join("inventory.json"),
                settle_delay: 1,
                ..Default::default()
            },
            format: OutputFormat::Text,
        }
    }

    fn make_image(dir: &TempDir, name: &str, hardware: &[u8], text: Option<&str>) -> PathBuf {
        let mut tag = SimulatedTag::ndef(hardware.to_vec(), 504);
        if let Some(text) = text {
            tag = tag
                .with_message(&NdefMessage::single(NdefRecord::text("en", text)))
                .unwrap();
        }
        let path = dir.path().join(name);
        fs::write(&path, tag.to_json().unwrap()).unwrap();
        path
    }

    fn add_container(ctx: &Context, tag: &str, name: &str) {
        cmd_container(
            ctx,
            ContainerAction::Add {
                tag: tag.into(),
                name: name.into(),
                description: None,
                capacity: None,
                image: None,
            },
        )
        .unwrap();
    }

    fn add_item(ctx: &Context, tag: &str, material: &str, container: Option<&str>) {
        cmd_item(
            ctx,
            ItemAction::Add {
                tag: tag.into(),
                name: None,
                description: None,
                container: container.map(str::to_string),
                metadata: MetadataArgs {
                    material: Some(material.into()),
                    ..Default::default()
                },
            },
        )
        .unwrap();
    }

    fn reopen(ctx: &Context) -> InventoryStore {
        InventoryStore::open_file(&ctx.config.data_path).unwrap()
    }

    // -----------------------------------------------------------------------
    // Containers and items
    // -----------------------------------------------------------------------

    #[test]
    fn init_seeds_standard_containers() {
        let dir = TempDir::new().unwrap();
        let ctx = make_ctx(&dir);
        cmd_init(&ctx, InitArgs { write_config: false }).unwrap();
        let store = reopen(&ctx);
        assert!(store.container(&StandardContainer::Printer.id()).is_some());
        assert!(store.container(&StandardContainer::Loose.id()).is_some());
    }

    #[test]
    fn deleting_a_box_moves_items_to_loose() {
        let dir = TempDir::new().unwrap();
        let ctx = make_ctx(&dir);
        add_container(&ctx, "BOX1", "Box 1");
        add_item(&ctx, "SPOOL", "PLA", Some("BOX1"));

        cmd_container(&ctx, ContainerAction::Rm { container: "box 1".into() }).unwrap();

        let store = reopen(&ctx);
        let loose = StandardContainer::Loose.id();
        let item = store.find_item_by_tag("SPOOL").unwrap();
        assert_eq!(item.container_id, Some(loose.clone()));
        assert!(store.container(&loose).unwrap().contains(&item.id));
        assert!(store.find_container_by_tag("BOX1").is_none());
    }

    #[test]
    fn standard_container_cannot_be_removed() {
        let dir = TempDir::new().unwrap();
        let ctx = make_ctx(&dir);
        let loose = StandardContainer::Loose.id().to_string();
        assert!(cmd_container(&ctx, ContainerAction::Rm { container: loose }).is_err());
    }

    #[test]
    fn duplicate_container_tag_is_rejected() {
        let dir = TempDir::new().unwrap();
        let ctx = make_ctx(&dir);
        add_container(&ctx, "BOX1", "Box 1");
        let again = cmd_container(
            &ctx,
            ContainerAction::Add {
                tag: "BOX1".into(),
                name: "Other".into(),
                description: None,
                capacity: None,
                image: None,
            },
        );
        assert!(again.is_err());
    }

    #[test]
    fn item_add_with_preset_fills_temperatures() {
        let dir = TempDir::new().unwrap();
        let ctx = make_ctx(&dir);
        cmd_item(
            &ctx,
            ItemAction::Add {
                tag: "AA11".into(),
                name: None,
                description: None,
                container: None,
                metadata: MetadataArgs {
                    material: Some("PETG".into()),
                    brand: Some("Sunlu".into()),
                    preset: true,
                    ..Default::default()
                },
            },
        )
        .unwrap();

        let item = reopen(&ctx).find_item_by_tag("AA11").unwrap();
        assert_eq!(item.name, "Sunlu PETG");
        let meta = item.metadata.unwrap();
        assert_eq!(meta.min_temp.as_deref(), Some("220"));
        assert_eq!(meta.bed_max_temp.as_deref(), Some("80"));
    }

    #[test]
    fn invalid_color_is_rejected() {
        let dir = TempDir::new().unwrap();
        let ctx = make_ctx(&dir);
        let result = cmd_item(
            &ctx,
            ItemAction::Add {
                tag: "AA11".into(),
                name: None,
                description: None,
                container: None,
                metadata: MetadataArgs {
                    color_hex: Some("#12".into()),
                    ..Default::default()
                },
            },
        );
        assert!(result.is_err());
        assert!(reopen(&ctx).items().is_empty());
    }

    #[test]
    fn edit_merges_metadata() {
        let dir = TempDir::new().unwrap();
        let ctx = make_ctx(&dir);
        add_item(&ctx, "SPOOL", "PLA", None);
        cmd_item(
            &ctx,
            ItemAction::Edit {
                item: "SPOOL".into(),
                name: Some("Red PLA".into()),
                tag: None,
                description: None,
                metadata: MetadataArgs {
                    color_name: Some("Red".into()),
                    ..Default::default()
                },
            },
        )
        .unwrap();

        let item = reopen(&ctx).find_item_by_tag("SPOOL").unwrap();
        assert_eq!(item.name, "Red PLA");
        let meta = item.metadata.unwrap();
        assert_eq!(meta.material.as_deref(), Some("PLA"));
        assert_eq!(meta.color_name.as_deref(), Some("Red"));
    }

    #[test]
    fn move_and_unassign() {
        let dir = TempDir::new().unwrap();
        let ctx = make_ctx(&dir);
        add_container(&ctx, "BOX1", "Box 1");
        add_container(&ctx, "BOX2", "Box 2");
        add_item(&ctx, "SPOOL", "PLA", Some("BOX1"));

        cmd_item(
            &ctx,
            ItemAction::Move {
                item: "SPOOL".into(),
                container: "BOX2".into(),
                from: Some("BOX1".into()),
            },
        )
        .unwrap();
        let unassign_wrong = cmd_item(
            &ctx,
            ItemAction::Unassign {
                item: "SPOOL".into(),
                container: "BOX1".into(),
            },
        );
        assert!(unassign_wrong.is_err());
        cmd_item(
            &ctx,
            ItemAction::Unassign {
                item: "SPOOL".into(),
                container: "BOX2".into(),
            },
        )
        .unwrap();

        let store = reopen(&ctx);
        assert!(store.find_item_by_tag("SPOOL").unwrap().container_id.is_none());
        assert!(store.check_invariants().is_empty());
    }

    // -----------------------------------------------------------------------
    // Tags and scans
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn write_binds_item_then_scan_adds_it() {
        let dir = TempDir::new().unwrap();
        let ctx = make_ctx(&dir);
        let box_image = make_image(&dir, "box.json", &[0x04, 0x01], Some("BOX1"));
        let spool_image = make_image(&dir, "spool.json", &[0xAA, 0x11], None);
        add_container(&ctx, "BOX1", "Box 1");
        add_item(&ctx, "draft", "PETG", None);

        cmd_tag(
            &ctx,
            TagAction::Write {
                image: spool_image.clone(),
                item: Some("draft".into()),
                container: None,
            },
        )
        .await
        .unwrap();

        let written = load_image(&spool_image).unwrap();
        assert!(written.raw_message().is_some());
        let item = reopen(&ctx).find_item_by_tag("AA11").unwrap();
        assert_eq!(item.metadata.unwrap().material.as_deref(), Some("PETG"));

        cmd_scan(
            &ctx,
            ScanAction::Add {
                images: vec![box_image, spool_image],
                yes: false,
            },
        )
        .await
        .unwrap();

        let store = reopen(&ctx);
        let bx = store.find_container_by_tag("BOX1").unwrap();
        assert!(bx.contains(&item.id));
        assert_eq!(store.item(&item.id).unwrap().container_id, Some(bx.id));
    }

    #[tokio::test]
    async fn write_to_a_bound_tag_leaves_the_image_untouched() {
        let dir = TempDir::new().unwrap();
        let ctx = make_ctx(&dir);
        let spool_image = make_image(&dir, "spool.json", &[0xAA, 0x11], None);
        add_item(&ctx, "AA11", "PLA", None);
        add_item(&ctx, "draft", "PETG", None);
        let before = fs::read_to_string(&spool_image).unwrap();

        let err = cmd_tag(
            &ctx,
            TagAction::Write {
                image: spool_image.clone(),
                item: Some("draft".into()),
                container: None,
            },
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("already bound"));
        assert_eq!(fs::read_to_string(&spool_image).unwrap(), before);
        assert!(reopen(&ctx).find_item_by_tag("draft").is_some());
    }

    #[tokio::test]
    async fn scan_add_skips_moves_unless_confirmed() {
        let dir = TempDir::new().unwrap();
        let ctx = make_ctx(&dir);
        let box_image = make_image(&dir, "box.json", &[1], Some("BOX1"));
        let spool_image = make_image(&dir, "spool.json", &[2], Some("SPOOL"));
        add_container(&ctx, "BOX1", "Box 1");
        add_item(&ctx, "SPOOL", "PLA", Some(StandardContainer::Loose.tag_id()));

        let images = vec![box_image, spool_image];
        cmd_scan(&ctx, ScanAction::Add { images: images.clone(), yes: false })
            .await
            .unwrap();
        let loose = StandardContainer::Loose.id();
        assert_eq!(reopen(&ctx).find_item_by_tag("SPOOL").unwrap().container_id, Some(loose));

        cmd_scan(&ctx, ScanAction::Add { images, yes: true }).await.unwrap();
        let store = reopen(&ctx);
        let bx = store.find_container_by_tag("BOX1").unwrap();
        assert_eq!(store.find_item_by_tag("SPOOL").unwrap().container_id, Some(bx.id));
    }

    #[tokio::test]
    async fn scan_remove_unassigns_item() {
        let dir = TempDir::new().unwrap();
        let ctx = make_ctx(&dir);
        let box_image = make_image(&dir, "box.json", &[1], Some("BOX1"));
        let spool_image = make_image(&dir, "spool.json", &[2], Some("SPOOL"));
        add_container(&ctx, "BOX1", "Box 1");
        add_item(&ctx, "SPOOL", "PLA", Some("BOX1"));

        cmd_scan(
            &ctx,
            ScanAction::Remove {
                images: vec![spool_image, box_image],
            },
        )
        .await
        .unwrap();

        let store = reopen(&ctx);
        assert!(store.find_item_by_tag("SPOOL").unwrap().container_id.is_none());
        assert!(store.find_container_by_tag("BOX1").unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn tag_new_writes_text_image() {
        let dir = TempDir::new().unwrap();
        let ctx = make_ctx(&dir);
        let image = dir.path().join("new.json");
        cmd_tag(
            &ctx,
            TagAction::New {
                image: image.clone(),
                hardware_id: "04a1".into(),
                kind: TagKindArg::Ndef,
                max_size: 128,
                read_only: false,
                text: Some("BOX9".into()),
            },
        )
        .await
        .unwrap();

        let mut tag = load_image(&image).unwrap();
        assert_eq!(read_tag(&mut tag).identifier, "BOX9");
    }

    #[test]
    fn unknown_preset_is_an_error() {
        let dir = TempDir::new().unwrap();
        let ctx = make_ctx(&dir);
        let show = |material: &str| {
            cmd_preset(
                &ctx,
                PresetAction::Show {
                    material: material.into(),
                    brand: None,
                },
            )
        };
        assert!(show("PLA").is_ok());
        assert!(show("PEEK").is_err());
    }
}
