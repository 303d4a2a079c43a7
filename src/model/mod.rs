pub mod board;

/// Entities carrying Trello's float ordering key.
pub trait Positioned {
    fn pos(&self) -> f64;
}

/// Order by `pos` ascending. `sort_by` is stable, so ties keep their
/// original relative order.
pub fn sorted_by_pos<T: Positioned>(items: &[T]) -> Vec<&T> {
    let mut sorted: Vec<&T> = items.iter().collect();
    sorted.sort_by(|a, b| a.pos().total_cmp(&b.pos()));
    sorted
}
