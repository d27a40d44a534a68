use emit_source::Disposable;

#[emit_source::event_interface]
pub trait Lifecycle {
    #[event(id: 1)]
    fn starting(&self);
}

#[emit_source::event_interface]
pub trait Connections: Lifecycle {
    #[event(id: 2)]
    fn connected(&self, peer: String);
}

#[emit_source::event_interface(provider: "Pool")]
pub trait Pool: Connections + Disposable + Send + Sync {
    #[event(id: 3)]
    fn exhausted(&self, size: usize);
}

fn main() {
    let generator = emit_source::Generator::default();

    let pool = generator.get::<dyn Pool>().unwrap();

    pool.starting();
    pool.connected(String::from("127.0.0.1"));
    pool.exhausted(8);
    pool.dispose();

    assert_eq!(3, pool.events().len());
}
