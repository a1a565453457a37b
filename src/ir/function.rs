//! Function bodies: an instruction arena plus per-block layout
//!
//! Instructions live in an arena addressed by [`InstId`]. Blocks only hold
//! the order of handles, so inserting before an instruction or deleting one
//! never invalidates any other handle. Use counts are maintained on every
//! edit, which lets passes ask whether an instruction became dead without
//! rescanning the function.

use super::instruction::{BlockId, InstData, InstId};
use super::types::Type;
use super::value::Value;

#[derive(Debug, Clone)]
struct InstNode {
    data: InstData,
    block: BlockId,
    uses: u32,
    live: bool,
}

/// Basic block: a name and an ordered list of instruction handles
#[derive(Debug, Clone)]
pub struct Block {
    /// Label
    pub name: String,
    insts: Vec<InstId>,
}

impl Block {
    /// Instructions of the block in program order
    pub fn insts(&self) -> &[InstId] {
        &self.insts
    }
}

/// A function: signature, blocks, and the instruction arena
///
/// A function without blocks is a declaration.
#[derive(Debug, Clone)]
pub struct Function {
    /// Symbol name
    pub name: String,
    /// Parameter types
    pub params: Vec<Type>,
    /// Return type
    pub ret: Type,
    insts: Vec<InstNode>,
    blocks: Vec<Block>,
}

impl Function {
    /// Create a function with no blocks
    pub fn new(name: impl Into<String>, params: Vec<Type>, ret: Type) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
            insts: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Returns true if the function has no body
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Append a new empty block
    pub fn add_block(&mut self, name: impl Into<String>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            name: name.into(),
            insts: Vec::new(),
        });
        id
    }

    /// First block, where execution starts
    pub fn entry_block(&self) -> Option<BlockId> {
        if self.blocks.is_empty() {
            None
        } else {
            Some(BlockId(0))
        }
    }

    /// Block by handle
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// All blocks in layout order
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (BlockId(i as u32), b))
    }

    /// Append an instruction at the end of `block`
    pub fn append_inst(&mut self, block: BlockId, data: InstData) -> InstId {
        let id = self.alloc(block, data);
        self.blocks[block.index()].insts.push(id);
        id
    }

    /// Insert an instruction at the head of `block`
    pub fn prepend_inst(&mut self, block: BlockId, data: InstData) -> InstId {
        let id = self.alloc(block, data);
        self.blocks[block.index()].insts.insert(0, id);
        id
    }

    /// Insert an instruction immediately before `anchor`
    ///
    /// Finds `anchor` by scanning its block and shifts the tail of the block,
    /// so each call is linear in the block length. Sandboxing a block with
    /// `n` accesses is therefore quadratic in `n`; the bench's straight-line
    /// functions are the worst case.
    // TODO: keep a per-block position index (or splice a batch of
    // instructions per anchor) once blocks with tens of thousands of
    // accesses show up.
    pub fn insert_before(&mut self, anchor: InstId, data: InstData) -> InstId {
        let block = self.insts[anchor.index()].block;
        let id = self.alloc(block, data);
        let layout = &mut self.blocks[block.index()].insts;
        let pos = layout
            .iter()
            .position(|&i| i == anchor)
            .unwrap_or(layout.len());
        layout.insert(pos, id);
        id
    }

    fn alloc(&mut self, block: BlockId, data: InstData) -> InstId {
        for op in &data.operands {
            self.add_use(op);
        }
        let id = InstId(self.insts.len() as u32);
        self.insts.push(InstNode {
            data,
            block,
            uses: 0,
            live: true,
        });
        id
    }

    /// Instruction by handle
    pub fn inst(&self, id: InstId) -> &InstData {
        &self.insts[id.index()].data
    }

    /// Block holding an instruction
    pub fn inst_block(&self, id: InstId) -> BlockId {
        self.insts[id.index()].block
    }

    /// Returns false once the instruction has been removed
    pub fn is_live(&self, id: InstId) -> bool {
        self.insts[id.index()].live
    }

    /// Operand `index` of an instruction
    pub fn operand(&self, id: InstId, index: usize) -> Option<&Value> {
        self.inst(id).operands.get(index)
    }

    /// Argument `index` of a call; never the callee
    pub fn call_arg(&self, id: InstId, index: usize) -> Option<&Value> {
        self.inst(id).call_args().get(index)
    }

    /// Replace operand `index` of an instruction, keeping use counts current
    pub fn set_operand(&mut self, id: InstId, index: usize, value: Value) {
        self.add_use(&value);
        let old = std::mem::replace(&mut self.insts[id.index()].data.operands[index], value);
        self.drop_use(&old);
    }

    /// Number of live operands referring to an instruction's result
    pub fn use_count(&self, id: InstId) -> u32 {
        self.insts[id.index()].uses
    }

    /// Unlink an instruction and release its operands
    ///
    /// The instruction must have no remaining uses.
    pub fn remove_inst(&mut self, id: InstId) {
        debug_assert_eq!(self.use_count(id), 0, "removing an instruction still in use");
        debug_assert!(self.is_live(id), "instruction removed twice");
        let block = self.insts[id.index()].block;
        self.blocks[block.index()].insts.retain(|&i| i != id);
        self.insts[id.index()].live = false;
        let operands = std::mem::take(&mut self.insts[id.index()].data.operands);
        for op in &operands {
            self.drop_use(op);
        }
    }

    fn add_use(&mut self, value: &Value) {
        if let Value::Inst(id) = value {
            self.insts[id.index()].uses += 1;
        }
    }

    fn drop_use(&mut self, value: &Value) {
        if let Value::Inst(id) = value {
            let node = &mut self.insts[id.index()];
            node.uses = node.uses.saturating_sub(1);
        }
    }

    /// Type of any value as seen from this function
    pub fn value_type(&self, value: &Value) -> Type {
        match value {
            Value::Inst(id) => self.inst(*id).ty.clone(),
            Value::Arg(n) => self.params.get(*n as usize).cloned().unwrap_or(Type::Void),
            Value::Const(c) => c.ty(),
            Value::Global(sym) => sym.ty.clone(),
        }
    }

    /// Snapshot of all live instructions in program order
    ///
    /// Later insertions do not show up in an existing snapshot, so a pass can
    /// walk it while editing the function.
    pub fn layout(&self) -> Vec<InstId> {
        self.blocks
            .iter()
            .flat_map(|b| b.insts.iter().copied())
            .collect()
    }

    /// Number of live instructions
    pub fn inst_count(&self) -> usize {
        self.blocks.iter().map(|b| b.insts.len()).sum()
    }
}
