use crate::types::Var;

/// Binary max-heap of variables ordered by an external activity array.
///
/// The activities live in the solver; every operation that may reorder the
/// heap borrows them.
#[derive(Debug, Default)]
pub struct VarHeap {
    heap: Vec<Var>,
    indices: Vec<Option<usize>>,
}

impl VarHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, var: Var) -> bool {
        matches!(self.indices.get(var.index()), Some(Some(_)))
    }

    pub fn insert(&mut self, var: Var, activity: &[f64]) {
        if var.index() >= self.indices.len() {
            self.indices.resize(var.index() + 1, None);
        }
        if self.contains(var) {
            return;
        }
        let pos = self.heap.len();
        self.heap.push(var);
        self.indices[var.index()] = Some(pos);
        self.heapify_up(pos, activity);
    }

    /// Restores the heap after the activity of `var` increased.
    pub fn bump(&mut self, var: Var, activity: &[f64]) {
        if let Some(Some(pos)) = self.indices.get(var.index()).copied() {
            self.heapify_up(pos, activity);
        }
    }

    pub fn pop_max(&mut self, activity: &[f64]) -> Option<Var> {
        if self.heap.is_empty() {
            return None;
        }
        let top = self.heap.swap_remove(0);
        self.indices[top.index()] = None;
        if let Some(&first) = self.heap.first() {
            self.indices[first.index()] = Some(0);
            self.heapify_down(0, activity);
        }
        Some(top)
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        self.indices[self.heap[i].index()] = Some(i);
        self.indices[self.heap[j].index()] = Some(j);
    }

    fn heapify_up(&mut self, mut index: usize, activity: &[f64]) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if activity[self.heap[index].index()] <= activity[self.heap[parent].index()] {
                break;
            }
            self.swap(index, parent);
            index = parent;
        }
    }

    fn heapify_down(&mut self, mut index: usize, activity: &[f64]) {
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut largest = index;
            if left < self.heap.len()
                && activity[self.heap[left].index()] > activity[self.heap[largest].index()]
            {
                largest = left;
            }
            if right < self.heap.len()
                && activity[self.heap[right].index()] > activity[self.heap[largest].index()]
            {
                largest = right;
            }
            if largest == index {
                break;
            }
            self.swap(index, largest);
            index = largest;
        }
    }
}
