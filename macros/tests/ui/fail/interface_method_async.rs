#[emit_source::event_interface]
trait Log {
    async fn started(&self);
}

fn main() {}
