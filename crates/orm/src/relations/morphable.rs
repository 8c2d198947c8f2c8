//! Capability trait exposing relation accessors on records
//!
//! Anything that can surface its inner [`Record`] gets the full accessor
//! surface through default methods: ad-hoc accessors built from a
//! determiner, and declared accessors resolved by relation name against
//! the entity definition.

use crate::error::{ModelError, ModelResult, RelationError};
use crate::model::{EntityDef, Record};
use crate::relations::def::{MorphKind, RelationDef};
use crate::relations::map::{global_morph_map, MorphMap};
use crate::relations::{MorphMany, MorphOne, MorphTo};

pub trait Morphable {
    fn as_record(&self) -> &Record;
    fn as_record_mut(&mut self) -> &mut Record;

    /// Collection of `target` rows pointing back via the determiner pair
    fn morph_many(&mut self, target: &'static EntityDef, determiner: &str) -> MorphMany<'_> {
        MorphMany::new(self.as_record_mut(), target, determiner)
    }

    fn morph_many_using(
        &mut self,
        target: &'static EntityDef,
        determiner: &str,
        map: &MorphMap,
    ) -> MorphMany<'_> {
        MorphMany::with_map(self.as_record_mut(), target, determiner, map)
    }

    /// At most one `target` row pointing back via the determiner pair
    fn morph_one(&mut self, target: &'static EntityDef, determiner: &str) -> MorphOne<'_> {
        MorphOne::new(self.as_record_mut(), target, determiner)
    }

    fn morph_one_using(
        &mut self,
        target: &'static EntityDef,
        determiner: &str,
        map: &MorphMap,
    ) -> MorphOne<'_> {
        MorphOne::with_map(self.as_record_mut(), target, determiner, map)
    }

    /// The owner this record points at, resolved among `candidates`
    fn morph_to(
        &mut self,
        candidates: &'static [&'static EntityDef],
        determiner: &str,
    ) -> MorphTo<'_> {
        MorphTo::new(self.as_record_mut(), candidates, determiner)
    }

    fn morph_to_using(
        &mut self,
        candidates: &'static [&'static EntityDef],
        determiner: &str,
        map: &MorphMap,
    ) -> MorphTo<'_> {
        MorphTo::with_map(self.as_record_mut(), candidates, determiner, map)
    }

    /// Declared collection relation, looked up by name
    fn relation_many(&mut self, name: &str) -> ModelResult<MorphMany<'_>> {
        self.relation_many_using(name, global_morph_map())
    }

    fn relation_many_using(&mut self, name: &str, map: &MorphMap) -> ModelResult<MorphMany<'_>> {
        let relation = declared(self.as_record().def(), name, MorphKind::Many)?;
        let target = fixed_target(self.as_record().def(), relation)?;
        Ok(MorphMany::declared(
            self.as_record_mut(),
            relation,
            target,
            map,
        ))
    }

    /// Declared single-row relation, looked up by name
    fn relation_one(&mut self, name: &str) -> ModelResult<MorphOne<'_>> {
        self.relation_one_using(name, global_morph_map())
    }

    fn relation_one_using(&mut self, name: &str, map: &MorphMap) -> ModelResult<MorphOne<'_>> {
        let relation = declared(self.as_record().def(), name, MorphKind::One)?;
        let target = fixed_target(self.as_record().def(), relation)?;
        Ok(MorphOne::declared(
            self.as_record_mut(),
            relation,
            target,
            map,
        ))
    }

    /// Declared inverse relation, looked up by name
    fn relation_to(&mut self, name: &str) -> ModelResult<MorphTo<'_>> {
        self.relation_to_using(name, global_morph_map())
    }

    fn relation_to_using(&mut self, name: &str, map: &MorphMap) -> ModelResult<MorphTo<'_>> {
        let relation = declared(self.as_record().def(), name, MorphKind::To)?;
        Ok(MorphTo::declared(self.as_record_mut(), relation, map))
    }
}

impl Morphable for Record {
    fn as_record(&self) -> &Record {
        self
    }

    fn as_record_mut(&mut self) -> &mut Record {
        self
    }
}

fn declared(
    def: &'static EntityDef,
    name: &str,
    kind: MorphKind,
) -> ModelResult<&'static RelationDef> {
    let Some(relation) = def.relation(name) else {
        return Err(RelationError::Undefined {
            entity: def.name.to_string(),
            relation: name.to_string(),
        }
        .into());
    };
    if relation.kind != kind {
        return Err(RelationError::InvalidArgument {
            method: accessor_name(kind).to_string(),
            reason: format!(
                "'{}' on {} is declared {}, expected {}",
                name, def.name, relation.kind, kind
            ),
        }
        .into());
    }
    Ok(relation)
}

fn fixed_target(
    def: &'static EntityDef,
    relation: &RelationDef,
) -> ModelResult<&'static EntityDef> {
    relation.fixed_target().ok_or_else(|| {
        ModelError::Configuration(format!(
            "relation '{}' on {} declares no fixed target",
            relation.name, def.name
        ))
    })
}

fn accessor_name(kind: MorphKind) -> &'static str {
    match kind {
        MorphKind::One => "relation_one",
        MorphKind::Many => "relation_many",
        MorphKind::To => "relation_to",
    }
}
