#[emit_source::event_interface]
pub trait IRequests {
    #[event(id: 1)]
    fn started(&self, path: String, attempt: u32);

    #[event(id: 2)]
    fn finished(&self);
}

fn main() {
    let generator = emit_source::Generator::default();

    let requests = generator.get::<dyn IRequests>().unwrap();

    requests.started(String::from("/"), 1);
    requests.finished();

    assert_eq!("Requests", requests.provider_name());
}
