//! Readable sphere report over a decoded multiworld archive
//!
//! The decoded root is a dict with three sections of interest:
//!
//! * `spheres`: list of `{player_id: {location_id, ...}}`, one per sphere
//! * `datapackage`: `{game: {"location_name_to_id": {name: id}}}`
//! * `slot_info`: `{player_id: <slot record>}`, usually a placeholder
//!
//! Only `spheres` is required. Missing names fall back to placeholder text.

use crate::error::ReportError;
use crate::pickle::{get_attr, repr, Graph, Mapping, Value};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt::Write;

pub const SEPARATOR_WIDTH: usize = 60;
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOptions {
    /// Append the sphere 1 check count ranking
    pub ranking: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub text: String,
    pub sphere_count: usize,
    /// Slots whose name or game could not be resolved, in slot_info order
    pub unresolved_slots: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub name: String,
    pub game: String,
}

impl PlayerInfo {
    fn fallback(slot: i64) -> Self {
        PlayerInfo {
            name: format!("Player {}", slot),
            game: UNKNOWN.to_string(),
        }
    }
}

/// Per-game location id -> name
#[derive(Debug, Default)]
pub struct LocationTable {
    games: HashMap<String, HashMap<i64, String>>,
}

impl LocationTable {
    pub fn from_graph(graph: &Graph, root: &Mapping) -> Self {
        let mut table = LocationTable::default();
        let Some(datapackage) = root.get_str("datapackage") else {
            debug!("No datapackage section; all locations will be unnamed");
            return table;
        };
        let Some(games) = graph.as_mapping(datapackage) else {
            warn!(
                "datapackage is a {}, not a dict; ignoring it",
                graph.type_name(datapackage)
            );
            return table;
        };

        for (game, game_data) in games.iter() {
            let Some(game) = game.as_str() else {
                warn!("Skipping datapackage entry keyed by {}", repr(graph, game));
                continue;
            };
            let Some(name_to_id) = graph
                .item(game_data, "location_name_to_id")
                .and_then(|v| graph.as_mapping(v))
            else {
                debug!("Game {} has no location_name_to_id table", game);
                continue;
            };

            let mut id_to_name = HashMap::with_capacity(name_to_id.len());
            for (name, id) in name_to_id.iter() {
                match (name.as_str(), id.as_int()) {
                    (Some(name), Some(id)) => {
                        id_to_name.insert(id, name.to_string());
                    }
                    _ => debug!(
                        "Skipping location entry {}: {} in {}",
                        repr(graph, name),
                        repr(graph, id),
                        game
                    ),
                }
            }
            debug!("Game {}: {} locations", game, id_to_name.len());
            table.games.insert(game.to_string(), id_to_name);
        }
        table
    }

    pub fn games(&self) -> usize {
        self.games.len()
    }

    pub fn name(&self, game: &str, id: i64) -> String {
        self.games
            .get(game)
            .and_then(|names| names.get(&id))
            .cloned()
            .unwrap_or_else(|| format!("Unknown ID {}", id))
    }
}

/// Slot id -> display name and game
#[derive(Debug, Default)]
pub struct PlayerTable {
    players: HashMap<i64, PlayerInfo>,
    unresolved: Vec<i64>,
}

impl PlayerTable {
    pub fn from_graph(graph: &Graph, root: &Mapping) -> Self {
        let mut table = PlayerTable::default();
        let Some(slot_info) = root.get_str("slot_info") else {
            debug!("No slot_info section; players will be unnamed");
            return table;
        };
        let Some(slots) = graph.as_mapping(slot_info) else {
            warn!(
                "slot_info is a {}, not a dict; ignoring it",
                graph.type_name(slot_info)
            );
            return table;
        };

        for (slot, record) in slots.iter() {
            let Some(slot_id) = slot.as_int() else {
                warn!("Skipping slot keyed by {}", repr(graph, slot));
                continue;
            };
            let name = attribute_text(graph, record, "name");
            let game = attribute_text(graph, record, "game");
            if name.is_none() || game.is_none() {
                if table.unresolved.is_empty() {
                    warn!(
                        "Could not resolve name/game of slot {}; recorded data: {}",
                        slot_id,
                        repr(graph, record)
                    );
                }
                table.unresolved.push(slot_id);
            }
            table.players.insert(
                slot_id,
                PlayerInfo {
                    name: name.unwrap_or_else(|| UNKNOWN.to_string()),
                    game: game.unwrap_or_else(|| UNKNOWN.to_string()),
                },
            );
        }
        table
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn unresolved(&self) -> &[i64] {
        &self.unresolved
    }

    pub fn get(&self, slot: i64) -> PlayerInfo {
        self.players
            .get(&slot)
            .cloned()
            .unwrap_or_else(|| PlayerInfo::fallback(slot))
    }
}

/// Text of an attribute; `None` and empty strings count as unresolved
fn attribute_text(graph: &Graph, value: &Value, name: &str) -> Option<String> {
    match get_attr(graph, value, name).value()? {
        Value::None => None,
        Value::Str(s) if s.is_empty() => None,
        Value::Str(s) => Some(s.to_string()),
        other => Some(repr(graph, other)),
    }
}

/// One sphere: players ascending, each with location ids ascending
struct Sphere {
    players: Vec<(i64, Vec<i64>)>,
    /// Entries in the source mapping, including skipped ones
    entries: usize,
}

fn parse_sphere(graph: &Graph, number: usize, value: &Value) -> Result<Sphere, ReportError> {
    let mapping = graph
        .as_mapping(value)
        .ok_or_else(|| ReportError::InvalidSection {
            section: "spheres",
            detail: format!("sphere {} is a {}, not a dict", number, graph.type_name(value)),
        })?;

    let mut players = Vec::with_capacity(mapping.len());
    for (player, locations) in mapping.iter() {
        let Some(player_id) = player.as_int() else {
            warn!(
                "Sphere {}: skipping player keyed by {}",
                number,
                repr(graph, player)
            );
            continue;
        };
        let items = graph
            .elements(locations)
            .ok_or_else(|| ReportError::InvalidSection {
                section: "spheres",
                detail: format!(
                    "sphere {} locations of player {} are a {}, not a collection",
                    number,
                    player_id,
                    graph.type_name(locations)
                ),
            })?;

        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            match item.as_int() {
                Some(id) => ids.push(id),
                None => warn!(
                    "Sphere {}: skipping location {} of player {}",
                    number,
                    repr(graph, item),
                    player_id
                ),
            }
        }
        ids.sort_unstable();
        players.push((player_id, ids));
    }
    players.sort_by_key(|(player_id, _)| *player_id);
    if players.is_empty() && !mapping.is_empty() {
        warn!(
            "Sphere {} has {} entries but none keyed by a player id",
            number,
            mapping.len()
        );
    }
    Ok(Sphere {
        players,
        entries: mapping.len(),
    })
}

/// Render the report for a decoded archive
pub fn build_report(
    graph: &Graph,
    source_name: &str,
    options: &ReportOptions,
) -> Result<Report, ReportError> {
    let root = graph
        .as_mapping(graph.root())
        .ok_or_else(|| ReportError::InvalidSection {
            section: "root",
            detail: format!("decoded data is a {}, not a dict", graph.type_name(graph.root())),
        })?;
    let spheres_value = root
        .get_str("spheres")
        .ok_or(ReportError::MissingSection("spheres"))?;
    let spheres = graph
        .elements(spheres_value)
        .ok_or_else(|| ReportError::InvalidSection {
            section: "spheres",
            detail: format!("expected a list, found a {}", graph.type_name(spheres_value)),
        })?
        .into_iter()
        .enumerate()
        .map(|(i, sphere)| parse_sphere(graph, i + 1, sphere))
        .collect::<Result<Vec<_>, _>>()?;

    let locations = LocationTable::from_graph(graph, root);
    let players = PlayerTable::from_graph(graph, root);
    info!(
        "Mapped {} games and {} players; translating {} spheres",
        locations.games(),
        players.len(),
        spheres.len()
    );

    let mut text = String::new();
    let _ = writeln!(text, "=== READABLE SPHERES REPORT ===");
    let _ = writeln!(text, "Source: {}", source_name);
    let _ = writeln!(text, "Total Spheres: {}", spheres.len());
    let _ = writeln!(text, "{}", "=".repeat(SEPARATOR_WIDTH));
    text.push('\n');

    for (i, sphere) in spheres.iter().enumerate() {
        let _ = writeln!(text, "--- Sphere {} ---", i + 1);
        if sphere.entries == 0 {
            let _ = writeln!(text, "  (Empty Sphere)");
            continue;
        }
        for (player_id, ids) in &sphere.players {
            let player = players.get(*player_id);
            let _ = writeln!(text, "  Player: {} ({})", player.name, player.game);
            for id in ids {
                let _ = writeln!(text, "    - {}", locations.name(&player.game, *id));
            }
            text.push('\n');
        }
        text.push('\n');
    }

    if options.ranking {
        let _ = writeln!(text, "=== SPHERE 1 CHECK COUNT RANKING ===");
        for (player_id, count) in sphere_one_ranking(&spheres) {
            let player = players.get(player_id);
            let _ = writeln!(
                text,
                "  Player: {} ({}), Checks: {}",
                player.name, player.game, count
            );
        }
    }

    Ok(Report {
        text,
        sphere_count: spheres.len(),
        unresolved_slots: players.unresolved().to_vec(),
    })
}

/// Check counts in the first sphere, highest first; ties keep player order
fn sphere_one_ranking(spheres: &[Sphere]) -> Vec<(i64, usize)> {
    let mut counts: Vec<(i64, usize)> = spheres
        .first()
        .map(|sphere| {
            sphere
                .players
                .iter()
                .map(|(player_id, ids)| (*player_id, ids.len()))
                .collect()
        })
        .unwrap_or_default();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pickle::value::{Key, Node, ValueSet};
    use crate::pickle::{Placeholder, TypeResolver};
    use indexmap::IndexMap;
    use test_log::test;

    fn dict(g: &mut Graph, pairs: Vec<(Value, Value)>) -> Value {
        let mut m = Mapping::new();
        for (k, v) in pairs {
            let key = g.key_of(&k).unwrap();
            m.insert(key, k, v);
        }
        g.alloc(Node::Dict(m))
    }

    fn int_set(g: &mut Graph, ids: &[i64]) -> Value {
        let mut s = ValueSet::new();
        for id in ids {
            s.insert(Key::Int(*id), Value::Int(*id));
        }
        g.alloc(Node::Set(s))
    }

    fn slot(g: &mut Graph, resolver: &mut TypeResolver, name: &str, game: &str) -> Value {
        let class = resolver.resolve("NetUtils", "NetworkSlot");
        let args = vec![Value::str(name), Value::str(game)];
        g.alloc(Node::Placeholder(Placeholder::new(class, args, IndexMap::new())))
    }

    /// spheres: [{1: {11, 10}, 2: {20}}, {}], with Alice/GameA and Bob/GameB
    fn sample_graph() -> Graph {
        let mut g = Graph::empty();
        let mut resolver = TypeResolver::new();

        let p1 = int_set(&mut g, &[11, 10]);
        let p2 = int_set(&mut g, &[20]);
        let sphere1 = dict(&mut g, vec![(Value::Int(2), p2), (Value::Int(1), p1)]);
        let sphere2 = dict(&mut g, vec![]);
        let spheres = g.alloc(Node::List(vec![sphere1, sphere2]));

        let names = dict(
            &mut g,
            vec![
                (Value::str("Gate"), Value::Int(10)),
                (Value::str("Tower"), Value::Int(11)),
            ],
        );
        let game_a = dict(&mut g, vec![(Value::str("location_name_to_id"), names)]);
        let datapackage = dict(&mut g, vec![(Value::str("GameA"), game_a)]);

        let alice = slot(&mut g, &mut resolver, "Alice", "GameA");
        let bob = slot(&mut g, &mut resolver, "Bob", "GameB");
        let slot_info = dict(&mut g, vec![(Value::Int(1), alice), (Value::Int(2), bob)]);

        let root = dict(
            &mut g,
            vec![
                (Value::str("spheres"), spheres),
                (Value::str("datapackage"), datapackage),
                (Value::str("slot_info"), slot_info),
            ],
        );
        g.root = root;
        g
    }

    #[test]
    fn test_plain_report_text() {
        let report = build_report(&sample_graph(), "game.archipelago", &ReportOptions::default())
            .unwrap();
        let expected = format!(
            "=== READABLE SPHERES REPORT ===\n\
             Source: game.archipelago\n\
             Total Spheres: 2\n\
             {}\n\
             \n\
             --- Sphere 1 ---\n  \
             Player: Alice (GameA)\n    \
             - Gate\n    \
             - Tower\n\
             \n  \
             Player: Bob (GameB)\n    \
             - Unknown ID 20\n\
             \n\
             \n\
             --- Sphere 2 ---\n  \
             (Empty Sphere)\n",
            "=".repeat(60)
        );
        assert_eq!(report.text, expected);
        assert_eq!(report.sphere_count, 2);
        assert!(report.unresolved_slots.is_empty());
    }

    #[test]
    fn test_ranking_orders_by_count() {
        let options = ReportOptions { ranking: true };
        let report = build_report(&sample_graph(), "x", &options).unwrap();
        assert!(report.text.ends_with(
            "=== SPHERE 1 CHECK COUNT RANKING ===\n  \
             Player: Alice (GameA), Checks: 2\n  \
             Player: Bob (GameB), Checks: 1\n"
        ));
    }

    #[test]
    fn test_ranking_ties_keep_player_order() {
        let mut g = Graph::empty();
        let a = int_set(&mut g, &[5]);
        let b = int_set(&mut g, &[6]);
        let c = int_set(&mut g, &[7, 8]);
        let sphere = dict(
            &mut g,
            vec![(Value::Int(3), b), (Value::Int(1), a), (Value::Int(2), c)],
        );
        let spheres = g.alloc(Node::List(vec![sphere]));
        g.root = dict(&mut g, vec![(Value::str("spheres"), spheres)]);

        let report = build_report(&g, "x", &ReportOptions { ranking: true }).unwrap();
        let ranking: Vec<&str> = report
            .text
            .lines()
            .skip_while(|l| !l.starts_with("=== SPHERE 1"))
            .skip(1)
            .collect();
        assert_eq!(
            ranking,
            vec![
                "  Player: Player 2 (Unknown), Checks: 2",
                "  Player: Player 1 (Unknown), Checks: 1",
                "  Player: Player 3 (Unknown), Checks: 1",
            ]
        );
    }

    #[test]
    fn test_sphere_with_only_unusable_keys_is_not_empty() {
        // spheres: [{'x': [1]}, {}]
        let mut g = Graph::empty();
        let locs = g.alloc(Node::List(vec![Value::Int(1)]));
        let odd = dict(&mut g, vec![(Value::str("x"), locs)]);
        let empty = dict(&mut g, vec![]);
        let spheres = g.alloc(Node::List(vec![odd, empty]));
        g.root = dict(&mut g, vec![(Value::str("spheres"), spheres)]);

        let report = build_report(&g, "x", &ReportOptions::default()).unwrap();
        assert!(report
            .text
            .ends_with("--- Sphere 1 ---\n\n--- Sphere 2 ---\n  (Empty Sphere)\n"));
    }

    #[test]
    fn test_missing_spheres_section() {
        let mut g = Graph::empty();
        g.root = dict(&mut g, vec![(Value::str("slot_info"), Value::None)]);
        assert_eq!(
            build_report(&g, "x", &ReportOptions::default()),
            Err(ReportError::MissingSection("spheres"))
        );
    }

    #[test]
    fn test_non_dict_root_and_sphere() {
        let mut g = Graph::empty();
        g.root = g.alloc(Node::List(vec![]));
        assert!(matches!(
            build_report(&g, "x", &ReportOptions::default()),
            Err(ReportError::InvalidSection { section: "root", .. })
        ));

        let mut g = Graph::empty();
        let spheres = g.alloc(Node::List(vec![Value::Int(3)]));
        g.root = dict(&mut g, vec![(Value::str("spheres"), spheres)]);
        assert!(matches!(
            build_report(&g, "x", &ReportOptions::default()),
            Err(ReportError::InvalidSection { section: "spheres", .. })
        ));
    }

    #[test]
    fn test_unresolved_slot_falls_back_to_unknown() {
        let mut g = Graph::empty();
        let mut resolver = TypeResolver::new();
        let class = resolver.resolve("NetUtils", "NetworkSlot");
        // no args and no state
        let record = g.alloc(Node::Placeholder(Placeholder::new(class, vec![], IndexMap::new())));
        let empty_name = slot(&mut g, &mut resolver, "", "GameC");
        let slot_info = dict(
            &mut g,
            vec![(Value::Int(4), record), (Value::Int(5), empty_name)],
        );
        let locs = int_set(&mut g, &[1]);
        let sphere = dict(&mut g, vec![(Value::Int(4), locs)]);
        let spheres = g.alloc(Node::List(vec![sphere]));
        g.root = dict(
            &mut g,
            vec![
                (Value::str("spheres"), spheres),
                (Value::str("slot_info"), slot_info),
            ],
        );

        let report = build_report(&g, "x", &ReportOptions::default()).unwrap();
        assert!(report.text.contains("  Player: Unknown (Unknown)\n    - Unknown ID 1\n"));
        assert_eq!(report.unresolved_slots, vec![4, 5]);
    }
}
