//! Inline editing of table rows.
//!
//! A row is either showing its values (Edit/Delete) or holding a draft in
//! input controls (Save/Cancel). Rows are tracked independently, so several
//! can be in editing at once. A draft only lives until the next full
//! re-render: any refresh, from any table, puts every row back to viewing.

use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;

use crate::app::Crm;
use crate::error::{CrmError, CrmResult};
use crate::repository::{Entity, Payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowMode {
    Viewing,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Edit,
    Delete,
    Save,
    Cancel,
}

impl Control {
    pub fn label(self) -> &'static str {
        match self {
            Control::Edit => "Edit",
            Control::Delete => "Delete",
            Control::Save => "Save",
            Control::Cancel => "Cancel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Number,
}

impl InputKind {
    pub fn html_type(self) -> &'static str {
        match self {
            InputKind::Text => "text",
            InputKind::Number => "number",
        }
    }
}

/// One editable cell.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub input: InputKind,
}

impl Field {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            input: InputKind::Text,
        }
    }

    pub const fn number(name: &'static str) -> Self {
        Self {
            name,
            input: InputKind::Number,
        }
    }
}

/// Current contents of a row's input controls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    values: BTreeMap<&'static str, String>,
}

impl Draft {
    pub fn of<E: Editable>(record: &E) -> Self {
        let values = E::FIELDS
            .iter()
            .map(|f| (f.name, record.field_value(f.name)))
            .collect();
        Self { values }
    }

    pub fn get(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or("")
    }

    /// Sets a field's input text. Returns `false` for a field the row does not have.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> bool {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }
}

/// A record type whose rows can be edited in place.
pub trait Editable: Entity {
    type Changes: Payload + Send;

    const FIELDS: &'static [Field];

    /// Text shown in the input for `field` when editing starts.
    fn field_value(&self, field: &str) -> String;

    /// Re-validates a draft into an update payload.
    fn changes(draft: &Draft) -> CrmResult<Self::Changes>;
}

#[derive(Debug, Clone)]
struct EditingRow {
    generation: u64,
    draft: Draft,
}

/// Per-table row state, keyed by record id.
#[derive(Debug)]
pub struct EditTable<E> {
    rows: HashMap<String, EditingRow>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Default for EditTable<E> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> EditTable<E> {
    pub fn new() -> Self {
        Self::default()
    }

    fn editing(&self, id: &str, crm: &Crm) -> Option<&EditingRow> {
        self.rows
            .get(id)
            .filter(|row| row.generation == crm.generation())
    }

    pub fn mode(&self, id: &str, crm: &Crm) -> RowMode {
        if self.editing(id, crm).is_some() {
            RowMode::Editing
        } else {
            RowMode::Viewing
        }
    }

    pub fn controls(&self, id: &str, crm: &Crm) -> [Control; 2] {
        match self.mode(id, crm) {
            RowMode::Viewing => [Control::Edit, Control::Delete],
            RowMode::Editing => [Control::Save, Control::Cancel],
        }
    }

    /// Deletes a row the user has already confirmed. Only offered while viewing.
    pub async fn delete(&mut self, id: &str, crm: &Crm) -> CrmResult<()> {
        if self.mode(id, crm) == RowMode::Editing {
            return Err(CrmError::invalid_state(
                "Save or cancel your changes before deleting.",
            ));
        }

        crm.repository::<E>().delete(id).await?;
        crm.refresh_and_render().await;
        self.rows.clear();
        Ok(())
    }
}

impl<E: Editable> EditTable<E> {
    /// Switches a row to editing, seeding the draft from the record.
    /// A row already in editing keeps its draft.
    pub fn begin_edit(&mut self, record: &E, crm: &Crm) -> &mut Draft {
        let generation = crm.generation();
        let row = self
            .rows
            .entry(record.id().to_string())
            .or_insert_with(|| EditingRow {
                generation,
                draft: Draft::of(record),
            });
        if row.generation != generation {
            *row = EditingRow {
                generation,
                draft: Draft::of(record),
            };
        }
        &mut row.draft
    }

    pub fn draft(&self, id: &str, crm: &Crm) -> Option<&Draft> {
        self.editing(id, crm).map(|row| &row.draft)
    }

    pub fn draft_mut(&mut self, id: &str, crm: &Crm) -> Option<&mut Draft> {
        let generation = crm.generation();
        self.rows
            .get_mut(id)
            .filter(|row| row.generation == generation)
            .map(|row| &mut row.draft)
    }

    /// Validates and stores the draft. On any failure the row stays in editing.
    pub async fn save(&mut self, id: &str, crm: &Crm) -> CrmResult<E> {
        let draft = self
            .draft(id, crm)
            .cloned()
            .ok_or_else(|| CrmError::invalid_state("This row is not being edited."))?;

        let changes = E::changes(&draft)?;
        let updated = crm.repository::<E>().update(id, &changes).await?;

        crm.refresh_and_render().await;
        self.rows.clear();
        Ok(updated)
    }

    /// Drops the draft and repaints from a fresh fetch.
    pub async fn cancel(&mut self, id: &str, crm: &Crm) -> CrmResult<()> {
        if self.mode(id, crm) != RowMode::Editing {
            return Err(CrmError::invalid_state("This row is not being edited."));
        }

        self.rows.clear();
        crm.refresh_and_render().await;
        Ok(())
    }
}
