const STORAGE: u64 = 0x4;
const NOISY: emit_source::Level = emit_source::Level::Verbose;

#[emit_source::event_interface(provider: "Storage-Events")]
pub trait Storage {
    #[event(
        id: 10,
        level: Warning,
        keywords: STORAGE,
        opcode: 1u8,
        task: 2,
        version: 1,
        message: "flushed {count} pages"
    )]
    fn flushed(&self, count: u64);

    #[event(id: 11, level: emit_source::Level::Verbose)]
    fn r#checked(&self, r#type: &'static str, ok: bool);

    #[event(id: 12, level: NOISY)]
    fn scanned(&self);

    #[event]
    fn compacted(&self, bytes: Option<String>);
}

fn main() {
    let generator = emit_source::Generator::builder()
        .automatic_event_ids(true)
        .build();

    let storage = generator.get::<dyn Storage>().unwrap();

    storage.flushed(3);
    storage.checked("page", true);
    storage.scanned();
    storage.compacted(None);

    let flushed = storage.events().get(10).unwrap();

    assert_eq!(emit_source::Level::Warning, flushed.level());
    assert_eq!(emit_source::Keywords::new(STORAGE), flushed.keywords());
    assert_eq!(Some("flushed {count} pages"), flushed.message());
    assert_eq!("type", storage.events().get(11).unwrap().params()[0].name());
    assert_eq!(emit_source::Level::Verbose, storage.events().get(12).unwrap().level());
    assert_eq!(13, storage.events().by_name("compacted").unwrap().id());
}
