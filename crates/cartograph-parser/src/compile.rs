//! Semantic compilation of a parsed [`Program`] into a [`WorldRecipe`].
//!
//! Compilation runs in three phases:
//!
//! 1. **Grouping**: declarations are grouped by subject and fixture key, and
//!    their attribute maps merged.
//! 2. **Classification**: each subject's `self` block decides what it is
//!    (plot, item, fixture, game settings, or actor); nested blocks become
//!    gates or fixtures owned by the subject.
//! 3. **Resolution**: owner references, `contains` lists, gate targets, and
//!    the start plot are resolved, plots without coordinates are laid out,
//!    and the recipe is emitted with content-derived ids.
//!
//! Every phase stops at the first problem.

use std::collections::HashSet;

use indexmap::IndexMap;
use log::{debug, info, trace};

use cartograph_core::{
    Direction, EntityId, EntityKind,
    recipe::{ActorSpec, FixtureSpec, GateSpec, ItemSpec, PlotKind, PlotSpec, WorldRecipe},
};

use crate::{
    compile_utils::{AttrMap, AttrReader, merge_attribute, normalize_spanned},
    error::{Diagnostic, ErrorCode, Result},
    parser_types::{Program, SubjectKind},
    span::{Span, Spanned},
};

/// Fixture key holding a subject's own attributes.
const SELF_KEY: &str = "self";

/// Key of the plot used as start when nothing else decides.
const START_KEY: &str = "start";

/// Key expression of a gate that does not declare one.
const DEFAULT_KEY_EXPRESSION: &str = "true";

/// Plots per row when laying out plots without coordinates.
const ROW_WIDTH: i64 = 6;

/// Footprint of an item that does not declare one.
const DEFAULT_FOOTPRINT: u32 = 1;

/// Entity kinds an explicit fixture owner may name, in lookup order.
const FIXTURE_OWNERS: &[EntityKind] = &[EntityKind::Plot, EntityKind::Fixture, EntityKind::Actor];

const ITEM_OWNERS: &[EntityKind] = &[
    EntityKind::Plot,
    EntityKind::Fixture,
    EntityKind::Item,
    EntityKind::Actor,
];

const ACTOR_OWNERS: &[EntityKind] = &[EntityKind::Plot, EntityKind::Fixture];

// ============================================================================
// Intermediate Definitions
// ============================================================================

/// A fixture block of a subject, merged across declarations.
#[derive(Debug)]
struct Block {
    raw: Spanned<String>,
    attrs: AttrMap,
}

/// All blocks declared under one subject key.
#[derive(Debug)]
struct Subject {
    kind: SubjectKind,
    raw: Spanned<String>,
    key: String,
    blocks: IndexMap<String, Block>,
}

/// A resolved reference to a keyed entity.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EntityRef {
    kind: EntityKind,
    key: String,
}

impl EntityRef {
    fn new(kind: EntityKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }

    fn id(&self) -> EntityId {
        EntityId::derive(self.kind, &self.key)
    }
}

/// Where a definition was declared, for collision diagnostics.
trait Origin {
    fn origin(&self) -> Span;
}

#[derive(Debug)]
struct PlotDef {
    origin: Span,
    name: String,
    description: Option<String>,
    region: Option<String>,
    location: Option<(i64, i64)>,
    kind: PlotKind,
    start: bool,
    contains: Vec<Spanned<String>>,
}

#[derive(Debug)]
struct GateDef {
    key: String,
    origin: Span,
    from_plot: String,
    to_plot: Spanned<String>,
    direction: Option<Direction>,
    visible: bool,
    key_expression: String,
    label: String,
    description: Option<String>,
}

#[derive(Debug)]
struct FixtureDef {
    origin: Span,
    name: String,
    description: Option<String>,
    visible: bool,
    owner_ref: Option<Spanned<String>>,
    owner: Option<EntityRef>,
    contains: Vec<Spanned<String>>,
}

#[derive(Debug)]
struct ItemDef {
    origin: Span,
    name: String,
    description: Option<String>,
    visible: bool,
    footprint: u32,
    capacity: Option<u32>,
    owner_ref: Option<Spanned<String>>,
    owner: Option<EntityRef>,
    /// The `contains` entry that claimed this item, if any.
    claimed_at: Option<Span>,
}

#[derive(Debug)]
struct ActorDef {
    origin: Span,
    name: String,
    description: Option<String>,
    visible: bool,
    player: bool,
    skills: Vec<String>,
    owner_ref: Option<Spanned<String>>,
    owner: Option<EntityRef>,
}

#[derive(Debug)]
struct GameDef {
    origin: Span,
    seed: i64,
    preamble: Option<String>,
    start_plot: Option<Spanned<String>>,
}

macro_rules! impl_origin {
    ($($def:ty),*) => {
        $(impl Origin for $def {
            fn origin(&self) -> Span {
                self.origin
            }
        })*
    };
}

impl_origin!(PlotDef, FixtureDef, ItemDef, ActorDef);

/// The kinds a `thing` subject can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThingKind {
    Plot,
    Item,
    Fixture,
    Game,
}

/// Insert `def` under `key`, rejecting a second definition of the same key.
fn insert_unique<T: Origin>(
    space: &mut IndexMap<String, T>,
    category: EntityKind,
    key: &str,
    def: T,
) -> Result<()> {
    if let Some(first) = space.get(key) {
        return Err(Diagnostic::error(format!(
            "{category} key `{key}` is declared more than once"
        ))
        .with_code(ErrorCode::E301)
        .with_label(def.origin(), "declared again here")
        .with_secondary_label(first.origin(), "first declared here")
        .with_help(format!("every {category} needs a key of its own")));
    }
    space.insert(key.to_string(), def);
    Ok(())
}

fn misplaced_block(block: &Block, subject: &str) -> Diagnostic {
    Diagnostic::error(format!(
        "`{}` cannot be declared under {subject}",
        block.raw.inner()
    ))
    .with_code(ErrorCode::E310)
    .with_label(block.raw.span(), "nested declaration not allowed here")
    .with_help("only plots hold gates, and only plots and actors hold nested fixtures")
}

// ============================================================================
// Grouping
// ============================================================================

/// Group declarations by subject, merging blocks that share a fixture key.
///
/// A fixture named `self` or named after its subject is the subject's own
/// block.
fn group(program: &Program) -> Result<Vec<Subject>> {
    let mut subjects: IndexMap<(SubjectKind, String), Subject> = IndexMap::new();

    for declaration in &program.declarations {
        let subject_key = normalize_spanned(
            declaration.subject_id.inner(),
            declaration.subject_id.span(),
        )?;
        let fixture_key = normalize_spanned(
            declaration.fixture_id.inner(),
            declaration.fixture_id.span(),
        )?;
        let block_key = if fixture_key == SELF_KEY || fixture_key == subject_key {
            SELF_KEY.to_string()
        } else {
            fixture_key
        };

        let subject = subjects
            .entry((declaration.subject_kind, subject_key.clone()))
            .or_insert_with(|| Subject {
                kind: declaration.subject_kind,
                raw: declaration.subject_id.clone(),
                key: subject_key,
                blocks: IndexMap::new(),
            });
        let block = subject
            .blocks
            .entry(block_key)
            .or_insert_with(|| Block {
                raw: declaration.fixture_id.clone(),
                attrs: AttrMap::new(),
            });

        for attribute in &declaration.attributes {
            merge_attribute(&mut block.attrs, attribute)?;
        }
    }

    Ok(subjects.into_values().collect())
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Default)]
struct Builder {
    plots: IndexMap<String, PlotDef>,
    gates: Vec<GateDef>,
    fixtures: IndexMap<String, FixtureDef>,
    items: IndexMap<String, ItemDef>,
    actors: IndexMap<String, ActorDef>,
    game: Option<GameDef>,
}

impl Builder {
    // ------------------------------------------------------------------------
    // Classification
    // ------------------------------------------------------------------------

    fn add_subject(&mut self, mut subject: Subject) -> Result<()> {
        let self_block = subject.blocks.shift_remove(SELF_KEY);
        let empty = AttrMap::new();
        let attrs = self_block.as_ref().map_or(&empty, |block| &block.attrs);
        let mut reader = AttrReader::new(attrs);
        let declared = reader.string_any(&["kind", "type"])?;

        match subject.kind {
            SubjectKind::Thing => {
                let kind = thing_kind(declared.as_ref())?;
                trace!(key = subject.key.as_str(), kind:?; "Classified thing");
                match kind {
                    ThingKind::Plot => self.add_plot(subject, reader),
                    ThingKind::Item => {
                        Self::reject_blocks(&subject, "item")?;
                        self.add_item(subject, reader)
                    }
                    ThingKind::Fixture => {
                        Self::reject_blocks(&subject, "fixture")?;
                        let desc = format!("fixture `{}`", subject.raw.inner());
                        let def = fixture_def(&subject.raw, None, reader, &desc)?;
                        insert_unique(&mut self.fixtures, EntityKind::Fixture, &subject.key, def)
                    }
                    ThingKind::Game => {
                        Self::reject_blocks(&subject, "game settings")?;
                        self.add_game(subject, reader)
                    }
                }
            }
            SubjectKind::Actor => {
                if let Some(kind) = declared
                    .as_ref()
                    .filter(|kind| !kind.inner().eq_ignore_ascii_case("actor"))
                {
                    return Err(Diagnostic::error(format!(
                        "unknown kind `{}` for actor `{}`",
                        kind.inner(),
                        subject.raw.inner()
                    ))
                    .with_code(ErrorCode::E303)
                    .with_label(kind.span(), "unknown kind")
                    .with_help("actor subjects only accept kind `actor`"));
                }
                trace!(key = subject.key.as_str(); "Classified actor");
                self.add_actor(subject, reader)
            }
        }
    }

    fn reject_blocks(subject: &Subject, kind: &str) -> Result<()> {
        match subject.blocks.values().next() {
            Some(block) => Err(misplaced_block(
                block,
                &format!("{kind} `{}`", subject.raw.inner()),
            )),
            None => Ok(()),
        }
    }

    fn add_plot(&mut self, subject: Subject, mut reader: AttrReader<'_>) -> Result<()> {
        let desc = format!("plot `{}`", subject.raw.inner());
        let name = reader.string("name")?;
        let description = reader.string("description")?;
        let region = reader.string("region")?;
        let x = reader.integer("locationX")?;
        let y = reader.integer("locationY")?;
        let start = reader.boolean("start")?.unwrap_or(false);
        let is_abstract = reader.boolean("abstract")?.unwrap_or(false);
        let contains = reader.key_list("contains")?;
        reader.finish(&desc)?;

        let location = match (x, y) {
            (Some(x), Some(y)) => Some((*x.inner(), *y.inner())),
            (None, None) => None,
            (Some(only), None) | (None, Some(only)) => {
                return Err(Diagnostic::error(format!(
                    "{desc} sets only one of `locationX` and `locationY`"
                ))
                .with_code(ErrorCode::E309)
                .with_label(only.span(), "the other coordinate is missing")
                .with_help("set both coordinates, or neither to place the plot automatically"));
            }
        };

        let def = PlotDef {
            origin: subject.raw.span(),
            name: name.map_or_else(|| subject.raw.inner().clone(), Spanned::into_inner),
            description: description.map(Spanned::into_inner),
            region: region.map(Spanned::into_inner),
            location,
            kind: if is_abstract {
                PlotKind::Abstract
            } else {
                PlotKind::Land
            },
            start,
            contains,
        };
        insert_unique(&mut self.plots, EntityKind::Plot, &subject.key, def)?;

        let owner = EntityRef::new(EntityKind::Plot, subject.key.as_str());
        for (block_key, block) in &subject.blocks {
            self.add_nested(&owner, &desc, block_key, block)?;
        }
        Ok(())
    }

    fn add_item(&mut self, subject: Subject, mut reader: AttrReader<'_>) -> Result<()> {
        let name = reader.string("name")?;
        let description = reader.string("description")?;
        let visible = reader.boolean("visible")?.unwrap_or(true);
        let owner_ref = reader.key_ref(&["owner", "ownerKey"])?;
        let footprint = reader.count("footprint")?.unwrap_or(DEFAULT_FOOTPRINT);
        let capacity = reader.count("capacity")?;
        reader.finish(&format!("item `{}`", subject.raw.inner()))?;

        let def = ItemDef {
            origin: subject.raw.span(),
            name: name.map_or_else(|| subject.raw.inner().clone(), Spanned::into_inner),
            description: description.map(Spanned::into_inner),
            visible,
            footprint,
            capacity,
            owner_ref,
            owner: None,
            claimed_at: None,
        };
        insert_unique(&mut self.items, EntityKind::Item, &subject.key, def)
    }

    fn add_actor(&mut self, subject: Subject, mut reader: AttrReader<'_>) -> Result<()> {
        let desc = format!("actor `{}`", subject.raw.inner());
        let name = reader.string("name")?;
        let description = reader.string("description")?;
        let visible = reader.boolean("visible")?.unwrap_or(true);
        let owner_ref = reader.key_ref(&["owner", "ownerKey"])?;
        let player = reader.boolean("player")?.unwrap_or(false);
        let skills = reader
            .string_list("skills")?
            .into_iter()
            .map(Spanned::into_inner)
            .collect();
        reader.finish(&desc)?;

        let def = ActorDef {
            origin: subject.raw.span(),
            name: name.map_or_else(|| subject.raw.inner().clone(), Spanned::into_inner),
            description: description.map(Spanned::into_inner),
            visible,
            player,
            skills,
            owner_ref,
            owner: None,
        };
        insert_unique(&mut self.actors, EntityKind::Actor, &subject.key, def)?;

        let owner = EntityRef::new(EntityKind::Actor, subject.key.as_str());
        for (block_key, block) in &subject.blocks {
            self.add_nested(&owner, &desc, block_key, block)?;
        }
        Ok(())
    }

    fn add_game(&mut self, subject: Subject, mut reader: AttrReader<'_>) -> Result<()> {
        let seed = reader.integer("seed")?.map_or(0, Spanned::into_inner);
        let preamble = reader.string("preamble")?.map(Spanned::into_inner);
        let start_plot = reader.key_ref(&["startPlot"])?;
        reader.finish(&format!("game settings `{}`", subject.raw.inner()))?;

        if let Some(first) = &self.game {
            return Err(Diagnostic::error("game settings are declared more than once")
                .with_code(ErrorCode::E301)
                .with_label(subject.raw.span(), "declared again here")
                .with_secondary_label(first.origin, "first declared here")
                .with_help("merge the settings into a single `kind=\"game\"` subject"));
        }

        self.game = Some(GameDef {
            origin: subject.raw.span(),
            seed,
            preamble,
            start_plot,
        });
        Ok(())
    }

    /// Compile a nested block as a gate if it leads somewhere, else as a fixture.
    fn add_nested(
        &mut self,
        owner: &EntityRef,
        owner_desc: &str,
        block_key: &str,
        block: &Block,
    ) -> Result<()> {
        let mut reader = AttrReader::new(&block.attrs);

        match reader.key_ref(&["leadsTo", "to"])? {
            Some(_) if owner.kind != EntityKind::Plot => Err(misplaced_block(block, owner_desc)),
            Some(to_plot) => {
                let gate = gate_def(owner, block_key, block, to_plot, reader)?;
                trace!(key = gate.key.as_str(), direction:? = gate.direction; "Declared gate");
                self.gates.push(gate);
                Ok(())
            }
            None => {
                let desc = format!("fixture `{}` of {owner_desc}", block.raw.inner());
                let def = fixture_def(&block.raw, Some(owner.clone()), reader, &desc)?;
                trace!(key = block_key, owner = owner.key.as_str(); "Declared nested fixture");
                insert_unique(&mut self.fixtures, EntityKind::Fixture, block_key, def)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    fn has(&self, kind: EntityKind, key: &str) -> bool {
        match kind {
            EntityKind::Plot => self.plots.contains_key(key),
            EntityKind::Fixture => self.fixtures.contains_key(key),
            EntityKind::Item => self.items.contains_key(key),
            EntityKind::Actor => self.actors.contains_key(key),
            EntityKind::World | EntityKind::Gate => false,
        }
    }

    fn resolve(
        &self,
        reference: &Spanned<String>,
        search: &[EntityKind],
        referrer: &str,
    ) -> Result<EntityRef> {
        let key = reference.inner();
        if let Some(kind) = search.iter().copied().find(|&kind| self.has(kind, key)) {
            return Ok(EntityRef::new(kind, key.as_str()));
        }

        let kinds: Vec<&str> = search.iter().map(EntityKind::as_str).collect();
        Err(
            Diagnostic::error(format!("owner `{key}` of {referrer} is not declared"))
                .with_code(ErrorCode::E307)
                .with_label(reference.span(), "unresolved owner")
                .with_help(format!("the owner must be a {}", kinds.join(" or "))),
        )
    }

    fn resolve_owners(&mut self) -> Result<()> {
        let fixture_owners = self
            .fixtures
            .iter()
            .map(|(key, def)| {
                def.owner_ref
                    .as_ref()
                    .map(|owner| self.resolve(owner, FIXTURE_OWNERS, &format!("fixture `{key}`")))
                    .transpose()
            })
            .collect::<Result<Vec<_>>>()?;
        for (def, owner) in self.fixtures.values_mut().zip(fixture_owners) {
            if owner.is_some() {
                def.owner = owner;
            }
        }

        let item_owners = self
            .items
            .iter()
            .map(|(key, def)| {
                def.owner_ref
                    .as_ref()
                    .map(|owner| self.resolve(owner, ITEM_OWNERS, &format!("item `{key}`")))
                    .transpose()
            })
            .collect::<Result<Vec<_>>>()?;
        for (def, owner) in self.items.values_mut().zip(item_owners) {
            def.owner = owner;
        }

        let actor_owners = self
            .actors
            .iter()
            .map(|(key, def)| {
                def.owner_ref
                    .as_ref()
                    .map(|owner| self.resolve(owner, ACTOR_OWNERS, &format!("actor `{key}`")))
                    .transpose()
            })
            .collect::<Result<Vec<_>>>()?;
        for (def, owner) in self.actors.values_mut().zip(actor_owners) {
            def.owner = owner;
        }

        Ok(())
    }

    /// Apply `contains` lists of plots and fixtures to item ownership.
    fn resolve_contains(&mut self) -> Result<()> {
        let containers: Vec<(EntityRef, Vec<Spanned<String>>)> = self
            .plots
            .iter()
            .map(|(key, def)| {
                (EntityRef::new(EntityKind::Plot, key.as_str()), def.contains.clone())
            })
            .chain(self.fixtures.iter().map(|(key, def)| {
                (EntityRef::new(EntityKind::Fixture, key.as_str()), def.contains.clone())
            }))
            .filter(|(_, contains)| !contains.is_empty())
            .collect();

        for (container, contains) in containers {
            for entry in contains {
                let key = entry.inner();
                let Some(item) = self.items.get_mut(key) else {
                    return Err(Diagnostic::error(format!(
                        "{} `{}` contains unknown item `{key}`",
                        container.kind, container.key
                    ))
                    .with_code(ErrorCode::E307)
                    .with_label(entry.span(), "no item with this key")
                    .with_help("declare the item with `.self.kind=\"item\"`"));
                };

                if let Some(first) = item.claimed_at {
                    return Err(Diagnostic::error(format!(
                        "item `{key}` is listed in more than one `contains`"
                    ))
                    .with_code(ErrorCode::E308)
                    .with_label(entry.span(), "claimed again here")
                    .with_secondary_label(first, "first claimed here")
                    .with_help("an item has exactly one owner"));
                }

                if let (Some(owner_ref), Some(owner)) = (&item.owner_ref, &item.owner) {
                    if *owner != container {
                        return Err(Diagnostic::error(format!(
                            "item `{key}` is owned by `{}` but contained in {} `{}`",
                            owner.key, container.kind, container.key
                        ))
                        .with_code(ErrorCode::E308)
                        .with_label(entry.span(), "contained here")
                        .with_secondary_label(owner_ref.span(), "owner declared here")
                        .with_help("remove the explicit owner or the `contains` entry"));
                    }
                }

                trace!(item = key.as_str(), owner = container.key.as_str(); "Claimed item");
                item.claimed_at = Some(entry.span());
                item.owner = Some(container.clone());
            }
        }

        Ok(())
    }

    fn resolve_gate_targets(&self) -> Result<()> {
        for gate in &self.gates {
            if !self.plots.contains_key(gate.to_plot.inner()) {
                return Err(Diagnostic::error(format!(
                    "gate `{}` leads to unknown plot `{}`",
                    gate.key,
                    gate.to_plot.inner()
                ))
                .with_code(ErrorCode::E307)
                .with_label(gate.to_plot.span(), "no plot with this key")
                .with_secondary_label(gate.origin, "gate declared here"));
            }
        }
        Ok(())
    }

    /// Decide the start plot.
    ///
    /// Tried in order: explicit markers, the player's plot, a plot keyed
    /// `start`, the only plot. A player placed outside an explicit start plot
    /// makes the start ambiguous.
    fn resolve_start(&self) -> Result<String> {
        let mut explicit: Vec<(&str, Span)> = self
            .plots
            .iter()
            .filter(|(_, def)| def.start)
            .map(|(key, def)| (key.as_str(), def.origin))
            .collect();

        if let Some(start) = self.game.as_ref().and_then(|game| game.start_plot.as_ref()) {
            if !self.plots.contains_key(start.inner()) {
                return Err(Diagnostic::error(format!(
                    "start plot `{}` is not declared",
                    start.inner()
                ))
                .with_code(ErrorCode::E307)
                .with_label(start.span(), "no plot with this key"));
            }
            if !explicit.iter().any(|(key, _)| *key == start.inner().as_str()) {
                explicit.push((start.inner().as_str(), start.span()));
            }
        }

        let mut players: Vec<(&str, Span)> = Vec::new();
        for def in self.actors.values().filter(|def| def.player) {
            let Some(owner) = def.owner.as_ref().filter(|owner| owner.kind == EntityKind::Plot)
            else {
                continue;
            };
            if !players.iter().any(|(key, _)| *key == owner.key) {
                players.push((owner.key.as_str(), def.origin));
            }
        }

        if let Some(key) = unique_candidate(&explicit, "marked as start")? {
            if let Some((other, player_span)) = players.iter().find(|(other, _)| *other != key) {
                let marker_span = explicit
                    .iter()
                    .find(|(candidate, _)| *candidate == key)
                    .map_or(*player_span, |(_, span)| *span);
                return Err(Diagnostic::error(format!(
                    "start plot is ambiguous between `{key}` and `{other}`"
                ))
                .with_code(ErrorCode::E304)
                .with_label(*player_span, "player placed here")
                .with_secondary_label(marker_span, "marked as start")
                .with_help("place the player in the start plot or drop the start marker"));
            }
            debug!(start = key; "Start plot set explicitly");
            return Ok(key.to_string());
        }

        if let Some(key) = unique_candidate(&players, "player placed here")? {
            debug!(start = key; "Start plot taken from player");
            return Ok(key.to_string());
        }

        if self.plots.contains_key(START_KEY) {
            debug!(start = START_KEY; "Start plot found by key");
            return Ok(START_KEY.to_string());
        }

        if let [(key, _)] = self.plots.iter().collect::<Vec<_>>().as_slice() {
            debug!(start = key.as_str(); "Start plot is the only plot");
            return Ok((*key).clone());
        }

        Err(Diagnostic::error("no start plot could be determined")
            .with_code(ErrorCode::E305)
            .with_help("mark one plot with `.self.start=true` or key it `start`"))
    }

    /// Assign coordinates to every plot, laying out unplaced plots in rows.
    fn layout(&self) -> IndexMap<String, (i64, i64)> {
        let mut occupied: HashSet<(i64, i64)> =
            self.plots.values().filter_map(|def| def.location).collect();

        // Land plots come first so abstract plots never split a row.
        let mut pending: Vec<(bool, &str, &str)> = self
            .plots
            .iter()
            .filter(|(_, def)| def.location.is_none())
            .map(|(key, def)| {
                let region = def.region.as_deref().unwrap_or("");
                (!def.kind.is_land(), region, key.as_str())
            })
            .collect();
        pending.sort_unstable();

        let mut placed: IndexMap<String, (i64, i64)> = IndexMap::new();
        let mut cell = 0;
        for (_, _, key) in pending {
            loop {
                let position = (cell % ROW_WIDTH, cell / ROW_WIDTH);
                cell += 1;
                if occupied.insert(position) {
                    trace!(plot = key, x = position.0, y = position.1; "Auto-placed plot");
                    placed.insert(key.to_string(), position);
                    break;
                }
            }
        }

        self.plots
            .iter()
            .map(|(key, def)| {
                let position = def
                    .location
                    .or_else(|| placed.get(key).copied())
                    .unwrap_or_default();
                (key.clone(), position)
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Emission
    // ------------------------------------------------------------------------

    fn finish(mut self) -> Result<WorldRecipe> {
        if self.plots.is_empty() {
            return Err(Diagnostic::error("the world declares no plots")
                .with_code(ErrorCode::E306)
                .with_help("declare a plot, e.g. `thing(hall).self.kind=\"plot\"`"));
        }

        self.resolve_owners()?;
        self.resolve_contains()?;
        self.resolve_gate_targets()?;
        let start = self.resolve_start()?;
        let positions = self.layout();

        let plots = self
            .plots
            .into_iter()
            .map(|(key, def)| {
                let (x, y) = positions.get(&key).copied().unwrap_or_default();
                PlotSpec {
                    id: EntityId::derive(EntityKind::Plot, &key),
                    key,
                    name: def.name,
                    region: def.region,
                    x,
                    y,
                    description: def.description,
                    kind: def.kind,
                }
            })
            .collect();

        let gates = self
            .gates
            .into_iter()
            .map(|def| GateSpec {
                id: EntityId::derive(EntityKind::Gate, &def.key),
                from_plot: Some(EntityId::derive(EntityKind::Plot, &def.from_plot)),
                direction: def.direction,
                to_plot: Some(EntityId::derive(EntityKind::Plot, def.to_plot.inner())),
                visible: def.visible,
                key_expression: Some(def.key_expression),
                label: def.label,
                description: def.description,
                key: def.key,
            })
            .collect();

        let fixtures = self
            .fixtures
            .into_iter()
            .map(|(key, def)| FixtureSpec {
                id: EntityId::derive(EntityKind::Fixture, &key),
                key,
                name: def.name,
                description: def.description,
                owner: def.owner.as_ref().map(EntityRef::id),
                visible: def.visible,
            })
            .collect();

        let items = self
            .items
            .into_iter()
            .map(|(key, def)| ItemSpec {
                id: EntityId::derive(EntityKind::Item, &key),
                key,
                name: def.name,
                description: def.description,
                owner: def.owner.as_ref().map(EntityRef::id),
                visible: def.visible,
                footprint: def.footprint,
                capacity: def.capacity,
            })
            .collect();

        let actors = self
            .actors
            .into_iter()
            .map(|(key, def)| ActorSpec {
                id: EntityId::derive(EntityKind::Actor, &key),
                key,
                name: def.name,
                description: def.description,
                owner: def.owner.as_ref().map(EntityRef::id),
                visible: def.visible,
                player: def.player,
                skills: def.skills,
            })
            .collect();

        let (seed, preamble) = self
            .game
            .map_or((0, None), |game| (game.seed, game.preamble));

        Ok(WorldRecipe {
            plots,
            gates,
            fixtures,
            items,
            actors,
            start_plot: Some(EntityId::derive(EntityKind::Plot, &start)),
            seed,
            preamble,
        })
    }
}

fn thing_kind(declared: Option<&Spanned<String>>) -> Result<ThingKind> {
    let Some(declared) = declared else {
        return Ok(ThingKind::Plot);
    };

    match declared.inner().to_ascii_lowercase().as_str() {
        "plot" => Ok(ThingKind::Plot),
        "item" => Ok(ThingKind::Item),
        "fixture" => Ok(ThingKind::Fixture),
        "game" => Ok(ThingKind::Game),
        other => Err(Diagnostic::error(format!("unknown thing kind `{other}`"))
            .with_code(ErrorCode::E303)
            .with_label(declared.span(), "unknown kind")
            .with_help("thing kinds are `plot`, `item`, `fixture` and `game`")),
    }
}

/// Read the attributes of a fixture, whether declared on its own or nested.
fn fixture_def(
    raw: &Spanned<String>,
    default_owner: Option<EntityRef>,
    mut reader: AttrReader<'_>,
    desc: &str,
) -> Result<FixtureDef> {
    let name = reader.string("name")?;
    let description = reader.string("description")?;
    let visible = reader.boolean("visible")?.unwrap_or(true);
    let owner_ref = reader.key_ref(&["owner", "ownerKey"])?;
    let contains = reader.key_list("contains")?;
    reader.finish(desc)?;

    Ok(FixtureDef {
        origin: raw.span(),
        name: name.map_or_else(|| raw.inner().clone(), Spanned::into_inner),
        description: description.map(Spanned::into_inner),
        visible,
        owner_ref,
        owner: default_owner,
        contains,
    })
}

fn gate_def(
    plot: &EntityRef,
    block_key: &str,
    block: &Block,
    to_plot: Spanned<String>,
    mut reader: AttrReader<'_>,
) -> Result<GateDef> {
    let direction = match reader.string("direction")? {
        Some(text) => Some(text.inner().parse::<Direction>().map_err(|err| {
            Diagnostic::error(err.to_string())
                .with_code(ErrorCode::E302)
                .with_label(text.span(), "unknown direction")
                .with_help("use a compass direction such as `north` or `ne`, or `up`/`down`")
        })?),
        None => block.raw.inner().parse::<Direction>().ok(),
    };
    let key_expression = reader
        .string("keyExpression")?
        .map_or_else(|| DEFAULT_KEY_EXPRESSION.to_string(), Spanned::into_inner);
    let label = reader
        .string("label")?
        .map_or_else(|| block.raw.inner().clone(), Spanned::into_inner);
    let description = reader.string("description")?.map(Spanned::into_inner);
    let visible = reader.boolean("visible")?.unwrap_or(true);
    reader.finish(&format!("gate `{}` of plot `{}`", block.raw.inner(), plot.key))?;

    Ok(GateDef {
        key: format!("{}/{block_key}", plot.key),
        origin: block.raw.span(),
        from_plot: plot.key.clone(),
        to_plot,
        direction,
        visible,
        key_expression,
        label,
        description,
    })
}

/// The single candidate key, if any; several distinct candidates are ambiguous.
fn unique_candidate<'k>(candidates: &[(&'k str, Span)], note: &str) -> Result<Option<&'k str>> {
    match candidates {
        [] => Ok(None),
        [(key, _)] => Ok(Some(*key)),
        [(first, first_span), (second, second_span), ..] => Err(Diagnostic::error(format!(
            "start plot is ambiguous between `{first}` and `{second}`"
        ))
        .with_code(ErrorCode::E304)
        .with_label(*second_span, note)
        .with_secondary_label(*first_span, note)
        .with_help("keep exactly one start marker")),
    }
}

/// Compile a parsed program into a recipe.
pub(crate) fn compile_program(program: &Program) -> Result<WorldRecipe> {
    info!(declarations = program.declarations.len(); "Compiling world");

    let subjects = group(program)?;
    debug!(subjects = subjects.len(); "Grouped declarations");

    let mut builder = Builder::default();
    for subject in subjects {
        builder.add_subject(subject)?;
    }
    debug!(
        plots = builder.plots.len(),
        gates = builder.gates.len(),
        fixtures = builder.fixtures.len(),
        items = builder.items.len(),
        actors = builder.actors.len();
        "Classified subjects",
    );

    let recipe = builder.finish()?;
    info!(entities = recipe.entity_count(); "World compiled");
    trace!(recipe:?; "Compiled recipe");
    Ok(recipe)
}
