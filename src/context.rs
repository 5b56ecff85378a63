// context.rs - external compilation context
// Caller-owned mapping from word name to VM-assigned word index. Lets a
// REPL compile later lines against words the VM already holds from
// earlier compilations. The compiler only reads from it; register and
// reset are caller operations between compiles.

struct ContextWord {
    name: String,
    vm_word_idx: i32,
}

/// Registered word names and their VM indices, in registration order.
pub struct CompileContext {
    words: Vec<ContextWord>,
}

impl CompileContext {
    pub fn new() -> Self {
        CompileContext { words: Vec::new() }
    }

    /// Drop all registered words but keep the allocation.
    pub fn reset(&mut self) {
        self.words.clear();
    }

    /// Register a word under a VM index. An existing entry with the same
    /// name (case-insensitive) is updated in place.
    pub fn register(&mut self, name: &str, vm_word_idx: i32) {
        if let Some(entry) = self
            .words
            .iter_mut()
            .find(|w| w.name.eq_ignore_ascii_case(name))
        {
            entry.vm_word_idx = vm_word_idx;
            return;
        }
        self.words.push(ContextWord { name: name.to_string(), vm_word_idx });
    }

    /// Case-insensitive lookup; returns the VM word index.
    pub fn find(&self, name: &str) -> Option<i32> {
        self.words
            .iter()
            .find(|w| w.name.eq_ignore_ascii_case(name))
            .map(|w| w.vm_word_idx)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Name of the idx-th registered word (registration order).
    pub fn name(&self, idx: usize) -> Option<&str> {
        self.words.get(idx).map(|w| w.name.as_str())
    }
}

impl Default for CompileContext {
    fn default() -> Self {
        Self::new()
    }
}
