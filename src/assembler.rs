/*!
  Resolves a symbolic program to machine words in two passes, and removes redundant
  store-reload pairs before that.

  The first pass records the offset of every tag. Tags consume no space, so a tag names the
  offset of the next instruction or data word. The second pass encodes each instruction with
  its tag argument replaced by that offset. Nothing is emitted if any record fails.
*/

use std::collections::HashMap;

use tracing::debug;

use crate::bytecode::{encode_instruction, Assembly, Instruction, Tag, Target, Word};
use crate::error::AssemblyError;

pub type TagTable = HashMap<Tag, Word>;

/// Maps every tag to the offset from the code base of the record that follows it.
pub fn resolve_tags(records: &[Assembly]) -> Result<TagTable, AssemblyError> {
  let mut tags   = TagTable::new();
  let mut offset = 0 as Word;

  for record in records {
    match record {
      Assembly::Tag(tag) => {
        if tags.insert(tag.clone(), offset).is_some() {
          return Err(AssemblyError::DuplicateTag(tag.clone()));
        }
      }
      Assembly::Instruction(_) | Assembly::Value(_) => offset += 1
    }
  }

  Ok(tags)
}

pub fn assemble(records: &[Assembly]) -> Result<Vec<Word>, AssemblyError> {
  let tags = resolve_tags(records)?;
  let mut words = Vec::with_capacity(records.len());

  for record in records {
    match record {

      Assembly::Tag(_) => {}

      Assembly::Value(value) => words.push(*value),

      Assembly::Instruction(Instruction::Addressed { opcode, target: Target::Tag(tag) }) => {
        let offset = *tags.get(tag).ok_or_else(|| AssemblyError::UndefinedTag(tag.clone()))?;
        let resolved = Instruction::Addressed { opcode: *opcode, target: Target::Offset(offset) };
        words.push(encode_instruction(&resolved)?);
      }

      Assembly::Instruction(instruction) => words.push(encode_instruction(instruction)?)

    }
  }

  debug!(tags = tags.len(), words = words.len(), "assembled");
  Ok(words)
}

/**
  Drops every load that immediately follows a store of the same register to the same
  location, since the register already holds the stored value. Each record is compared with
  the last record kept, so a run such as `SLD 5; LLD 5; LLD 5` collapses in one pass and
  a second pass finds nothing to do. A tag between the two breaks the pair, because control
  may arrive at the load from elsewhere.
*/
pub fn optimize(records: &[Assembly]) -> Vec<Assembly> {
  let mut kept: Vec<Assembly> = Vec::with_capacity(records.len());

  for record in records {
    let redundant =
      match (kept.last(), record) {
        (Some(Assembly::Instruction(store)), Assembly::Instruction(load)) => reloads(store, load),
        _                                                                   => false
      };
    match redundant {
      true  => {}
      false => kept.push(record.clone())
    }
  }

  kept
}

/// True if `load` reads back into the same register exactly what `store` just wrote.
fn reloads(store: &Instruction, load: &Instruction) -> bool {
  let same_place =
    match (store, load) {
      (Instruction::Addressed { target: a, .. }, Instruction::Addressed { target: b, .. }) => a == b,
      (Instruction::Frame { offset: a, .. },     Instruction::Frame { offset: b, .. })     => a == b,
      _                                                                                    => false
    };
  same_place && store.opcode().load_for() == Some(load.opcode())
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::{parse_assembly, Opcode};
  use proptest::prelude::*;

  fn listing(text: &str) -> Vec<Assembly> {
    parse_assembly(text).unwrap()
  }

  #[test]
  fn resolves_tags_to_offsets() {
    let records = listing("
      CALL main
      JMP -1
      .word 4
    main:
      LLS lit.5
      RET
    lit.5:
      .word 5
    ");
    let words = assemble(&records).unwrap();
    assert_eq!(words, vec![0x4300_0003, 0x42FF_FFFF_u32 as Word, 4, 0x1000_0005, 0x4400_0000, 5]);
  }

  #[test]
  fn tags_share_the_offset_of_what_follows() {
    let tags = resolve_tags(&listing("a:\nb:\n  NOP\nc:\n")).unwrap();
    assert_eq!(tags[&Tag::from("a")], 0);
    assert_eq!(tags[&Tag::from("b")], 0);
    assert_eq!(tags[&Tag::from("c")], 1);
  }

  #[test]
  fn undefined_and_duplicate_tags_are_fatal() {
    assert_eq!(
      assemble(&listing("JMP nowhere")),
      Err(AssemblyError::UndefinedTag(Tag::from("nowhere")))
    );
    assert_eq!(
      assemble(&listing("x:\n  NOP\nx:\n")),
      Err(AssemblyError::DuplicateTag(Tag::from("x")))
    );
  }

  #[test]
  fn mismatched_shapes_are_unsupported() {
    let records = vec![Assembly::Instruction(Instruction::Frame { opcode: Opcode::Swap, offset: 1 })];
    assert!(matches!(assemble(&records), Err(AssemblyError::UnsupportedInstruction(_))));
  }

  #[test]
  fn drops_a_reload_of_the_stored_value() {
    assert_eq!(optimize(&listing("SLD 5\nLLD 5")), listing("SLD 5"));
    assert_eq!(optimize(&listing("SRS g\nLRS g\nSWP")), listing("SRS g\nSWP"));
  }

  #[test]
  fn keeps_loads_that_differ() {
    let keep = [
      "SLD 5\nLLD 6",     // different slot
      "SLD 5\nLRD 5",     // different register
      "SLD 5\nLLDI 5",    // different addressing
      "SLS g\nLLD 0",     // different family
      "SLD 5\nt:\nLLD 5", // tag in between
    ];
    for text in keep {
      assert_eq!(optimize(&listing(text)), listing(text), "{}", text);
    }
  }

  #[test]
  fn collapses_runs_of_reloads() {
    assert_eq!(optimize(&listing("SLD 1\nLLD 1\nLLD 1\nSWP")), listing("SLD 1\nSWP"));
  }

  fn record() -> impl Strategy<Value = Assembly> {
    let opcodes = prop::sample::select(vec![
      Opcode::LoadLeftFrame, Opcode::LoadRightFrame, Opcode::StoreLeftFrame,
      Opcode::StoreRightFrame, Opcode::LoadLeftFrameIndirect, Opcode::StoreLeftFrameIndirect,
    ]);
    prop_oneof![
      (opcodes, 0..3i32).prop_map(|(opcode, offset)| Assembly::Instruction(Instruction::Frame { opcode, offset })),
      (0..3i32).prop_map(|n| Assembly::Tag(Tag::from(format!("t{}", n)))),
      Just(Assembly::Instruction(Instruction::Nullary(Opcode::Swap))),
      any::<i32>().prop_map(Assembly::Value),
    ]
  }

  proptest! {
    #[test]
    fn optimize_is_idempotent(records in prop::collection::vec(record(), 0..40)) {
      let once = optimize(&records);
      prop_assert_eq!(optimize(&once), once.clone());
      prop_assert!(once.len() <= records.len());
    }

    #[test]
    fn assembly_is_deterministic(records in prop::collection::vec(record(), 0..40)) {
      prop_assert_eq!(assemble(&records), assemble(&records));
    }
  }
}
