// src/recording/subject.rs
//! Subject state handed to the position sampler

use crate::identity::DurableId;
use crate::recording::event::BlockPos;

/// Item code of an empty slot
pub const EMPTY_ITEM: i32 = 0;

/// One inventory slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemStack {
    pub item: i32,
    pub amount: i32,
}

impl ItemStack {
    pub fn new(item: i32, amount: i32) -> Self {
        Self { item, amount }
    }

    pub fn is_empty(&self) -> bool {
        self.item == EMPTY_ITEM || self.amount <= 0
    }
}

/// Current state of one active participant
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSnapshot {
    pub id: DurableId,
    pub x: f64,
    pub y: f64,
    pub z: f64,

    /// Item code in the main hand, `None` for an empty hand
    pub held_item: Option<i32>,

    pub inventory: Vec<ItemStack>,
    pub armor: Vec<ItemStack>,
}

impl SubjectSnapshot {
    pub fn new(id: DurableId, x: f64, y: f64, z: f64) -> Self {
        Self {
            id,
            x,
            y,
            z,
            held_item: None,
            inventory: Vec::new(),
            armor: Vec::new(),
        }
    }

    pub fn with_held_item(mut self, item: i32) -> Self {
        self.held_item = (item != EMPTY_ITEM).then_some(item);
        self
    }

    pub fn with_inventory(mut self, inventory: Vec<ItemStack>) -> Self {
        self.inventory = inventory;
        self
    }

    pub fn with_armor(mut self, armor: Vec<ItemStack>) -> Self {
        self.armor = armor;
        self
    }

    pub fn block_pos(&self) -> BlockPos {
        BlockPos::from_world(self.x, self.y, self.z)
    }

    /// Total items carried across inventory and armour slots
    pub fn carried_count(&self) -> i32 {
        self.inventory
            .iter()
            .chain(self.armor.iter())
            .filter(|stack| !stack.is_empty())
            .fold(0i32, |total, stack| total.saturating_add(stack.amount))
    }
}
