use rs2_signal::{combine, LeakRegistry, Stream, StreamConfig, SubscribeOptions};

fn main() {
    let registry = LeakRegistry::enabled();
    let config = StreamConfig::default().with_registry(registry.clone());

    let user: Stream<Option<String>> = Stream::with_config(config.clone().label("user"));
    let room: Stream<Option<String>> = Stream::with_config(config.label("room"));

    // Re-render whenever either side changes, skipping identical renders.
    // Derived streams do not keep their source alive, so each stage is bound.
    let joined = combine!(user, room);
    let lines = joined.map(|(user, room)| format!("{:?} in {:?}", user, room));
    let rendered = lines.distinct_values();

    let sub = rendered.subscribe_with(SubscribeOptions::new().replay(true), |line| {
        println!("render: {}", line)
    });

    user.trigger(Some("ada".into()));
    room.trigger(None);
    room.trigger(Some("lobby".into()));
    user.trigger(Some("grace".into()));
    user.trigger(Some("grace".into()));

    sub.dispose();
    drop(rendered);
    drop(lines);
    drop(joined);
    drop(user);
    drop(room);

    let report = registry.validate();
    println!("outstanding after teardown: {}", report.outstanding_total());
    match report.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("failed to render report: {}", e),
    }
}
