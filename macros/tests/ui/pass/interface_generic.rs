#[emit_source::event_interface]
pub trait Measured<T: emit_source::Argument> {
    #[event(id: 1)]
    fn measured(&self, value: T);
}

fn main() {
    let generator = emit_source::Generator::default();

    let measured = generator.get::<dyn Measured<i32>>().unwrap();
    measured.measured(42i32);

    assert_eq!("Measured-i32", measured.provider_name());
}
