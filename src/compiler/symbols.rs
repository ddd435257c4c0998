use bimap::BiMap;

use super::Name;
use crate::bytecode::Word;

/// Symbol values start here, far above the literals a program is likely to use.
pub const SYMBOL_BASE: Word = 0x4000_0000;

/**
  The pool of `@symbol` constants. Each distinct name gets the next id from `SYMBOL_BASE` up,
  and the same name always gets the same id within a compilation. The pool is really just a
  convenience wrapper around a BiMap, so an id can be turned back into its name.
*/
#[derive(Clone, Debug, Default)]
pub struct SymbolPool {
  table: BiMap<Name, Word>
}

impl SymbolPool {

  pub fn new() -> SymbolPool {
    SymbolPool {
      table: BiMap::new()
    }
  }

  /// Returns the id of `name` and whether this call assigned it.
  pub fn intern(&mut self, name: &Name) -> (Word, bool) {
    if let Some(id) = self.table.get_by_left(name) {
      return (*id, false);
    }
    let id = SYMBOL_BASE + self.table.len() as Word;
    // Ids only grow and the name was just looked up, so neither side can collide.
    let _ = self.table.insert_no_overwrite(name.clone(), id);
    (id, true)
  }

  pub fn name(&self, id: Word) -> Option<&Name> {
    self.table.get_by_right(&id)
  }

  pub fn len(&self) -> usize {
    self.table.len()
  }

  pub fn is_empty(&self) -> bool {
    self.table.is_empty()
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interns_names_in_order() {
    let mut pool = SymbolPool::new();
    let red   = Name::from("red");
    let green = Name::from("green");

    assert_eq!(pool.intern(&red), (SYMBOL_BASE, true));
    assert_eq!(pool.intern(&green), (SYMBOL_BASE + 1, true));
    assert_eq!(pool.intern(&red), (SYMBOL_BASE, false));

    assert_eq!(pool.len(), 2);
    assert_eq!(pool.name(SYMBOL_BASE + 1), Some(&green));
    assert_eq!(pool.name(SYMBOL_BASE), Some(&red));
    assert_eq!(pool.name(0), None);
  }
}
