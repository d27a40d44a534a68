#[emit_source::event_interface]
trait Log {
    fn started(&self) -> bool;
}

fn main() {}
