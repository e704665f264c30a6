use std::collections::HashMap;
use std::path::Path;

use outbreak_core::{Item, Participant};
use outbreak_dsl::{Effect, EffectResult, Predicate, ScriptDefinitionError, ScriptPart};

/// The catalog compiled into this binary.
pub const DEFAULT_CATALOG: &str = include_str!("../catalog/default.items");

/// Compiled scripts for one item.
#[derive(Debug, Clone)]
pub struct CompiledItem {
    /// Runs on use.
    pub effect: Effect,
    /// Gates buying and using.
    pub predicate: Predicate,
}

/// Compiled effects and predicates for every item in the document, keyed by
/// item id. Stock and flags stay on the [`Item`] records themselves.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    compiled: HashMap<String, CompiledItem>,
}

impl ItemCatalog {
    /// Compile every item's scripts. Any failure is fatal.
    pub fn compile(items: &[Item]) -> Result<Self, ScriptDefinitionError> {
        let mut compiled = HashMap::with_capacity(items.len());
        for item in items {
            let (effect, predicate) = outbreak_dsl::compile_item(item)?;
            compiled.insert(item.id.clone(), CompiledItem { effect, predicate });
        }
        tracing::debug!(items = compiled.len(), "catalog compiled");
        Ok(Self { compiled })
    }

    /// Compiled scripts for an item id.
    pub fn get(&self, id: &str) -> Option<&CompiledItem> {
        self.compiled.get(id)
    }

    /// Number of compiled items.
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    /// True for an empty catalog.
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// Unlocked, in stock, predicate holds, and not already owned.
    pub fn is_buyable(&self, item: &Item, participant: &Participant) -> EffectResult<bool> {
        if participant.is_dead() || !item.unlocked || item.in_stock == 0 || participant.owns(&item.id) {
            return Ok(false);
        }
        self.predicate_holds(item, participant)
    }

    /// Alive, predicate holds, and uses remain.
    pub fn is_usable(&self, item: &Item, participant: &Participant) -> EffectResult<bool> {
        if participant.is_dead() || participant.remaining_uses(&item.id).unwrap_or(0) == 0 {
            return Ok(false);
        }
        self.predicate_holds(item, participant)
    }

    fn predicate_holds(&self, item: &Item, participant: &Participant) -> EffectResult<bool> {
        match self.compiled.get(&item.id) {
            Some(compiled) => compiled.predicate.evaluate(participant),
            None => Ok(false),
        }
    }
}

/// Read the catalog definitions: the file at `path`, or the built-in set.
pub fn load_definitions(path: Option<&Path>) -> Result<Vec<Item>, ScriptDefinitionError> {
    let Some(path) = path else {
        return outbreak_dsl::load_catalog("default.items", DEFAULT_CATALOG);
    };
    let name = path.display().to_string();
    let (source, result) = outbreak_dsl::compile_catalog_file(path);
    if result.has_errors() {
        return Err(ScriptDefinitionError {
            item: name,
            part: ScriptPart::Catalog,
            script: source,
            diagnostics: result.diagnostics,
        });
    }
    Ok(result.items)
}

/// Append-only merge of freshly defined items onto the stored list, matched
/// by position. Existing entries keep their stock and flags. Returns how many
/// items were appended.
pub fn merge_refresh(store: &mut Vec<Item>, fresh: Vec<Item>) -> usize {
    let before = store.len();
    store.extend(fresh.into_iter().skip(before));
    store.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbreak_core::ParticipantId;

    fn mask() -> Item {
        Item::new("mask", "Mask", 5, "masked = true").unlocked(true)
    }

    fn research() -> Item {
        Item::new("dna", "Research Item", 5, "pass")
            .with_uses(0)
            .with_predicate("healer")
            .unlocked(true)
    }

    fn person() -> Participant {
        Participant::with_immunity(ParticipantId(1), false)
    }

    #[test]
    fn default_catalog_compiles() {
        let items = load_definitions(None).unwrap();
        assert_eq!(items.len(), 15);
        assert_eq!(items[0].id, "mask");
        assert_eq!(items.last().unwrap().id, "education");
        let potato = items.iter().find(|i| i.id == "potato").unwrap();
        assert!(potato.unlocked);
        assert_eq!(potato.uses, 5);
        assert!(potato.description.starts_with("\"Some people"));
        let catalog = ItemCatalog::compile(&items).unwrap();
        assert_eq!(catalog.len(), 15);
    }

    #[test]
    fn broken_script_is_fatal() {
        let items = vec![mask(), Item::new("soap", "Soap", 1, "sickness = \"clean\"")];
        let err = ItemCatalog::compile(&items).unwrap_err();
        assert_eq!(err.item, "soap");
        assert_eq!(err.part, ScriptPart::Effect);
    }

    #[test]
    fn buyable_rules() {
        let catalog = ItemCatalog::compile(&[mask(), research()]).unwrap();
        let mut p = person();
        let mut item = mask();
        assert!(catalog.is_buyable(&item, &p).unwrap());

        assert!(!catalog.is_buyable(&research(), &p).unwrap());
        p.become_healer();
        assert!(catalog.is_buyable(&research(), &p).unwrap());

        item.unlocked = false;
        assert!(!catalog.is_buyable(&item, &p).unwrap());
        item.unlocked = true;
        item.in_stock = 0;
        assert!(!catalog.is_buyable(&item, &p).unwrap());
        item.restock();
        p.acquire("mask", 1);
        assert!(!catalog.is_buyable(&item, &p).unwrap());
    }

    #[test]
    fn usable_rules() {
        let catalog = ItemCatalog::compile(&[mask(), research()]).unwrap();
        let mut p = person();
        assert!(!catalog.is_usable(&mask(), &p).unwrap());
        p.acquire("mask", 1);
        assert!(catalog.is_usable(&mask(), &p).unwrap());
        p.consume_use("mask");
        assert!(!catalog.is_usable(&mask(), &p).unwrap());

        p.become_healer();
        p.acquire("dna", 0);
        assert!(!catalog.is_usable(&research(), &p).unwrap());
    }

    #[test]
    fn dead_participants_can_do_nothing() {
        let catalog = ItemCatalog::compile(&[mask()]).unwrap();
        let mut p = person();
        p.acquire("mask", 1);
        p.kill(chrono::Utc::now());
        assert!(!catalog.is_usable(&mask(), &p).unwrap());
        assert!(!catalog.is_buyable(&mask(), &p).unwrap());
    }

    #[test]
    fn refresh_only_appends() {
        let mut store = vec![mask()];
        store[0].in_stock = 1;
        let fresh = vec![Item::new("mask", "New Mask", 50, "pass"), research()];
        assert_eq!(merge_refresh(&mut store, fresh), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store[0].name, "Mask");
        assert_eq!(store[0].in_stock, 1);
        assert_eq!(store[1].id, "dna");
        assert_eq!(merge_refresh(&mut store, vec![mask()]), 0);
    }
}
