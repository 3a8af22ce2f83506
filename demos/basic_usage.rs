use rs2_signal::{Stream, SubscribeOptions};

fn main() {
    // Create a stream and push a first value before anyone listens
    let temperature = Stream::new();
    temperature.trigger(18.5f64);

    // Derived streams replay the current value on construction
    let fahrenheit = temperature.map(|c| c * 9.0 / 5.0 + 32.0);
    let warm = temperature.filter(|&c| c >= 20.0);

    let f_sub = fahrenheit.subscribe_with(SubscribeOptions::new().replay(true), |f| {
        println!("Fahrenheit: {:.1}", f)
    });
    let warm_sub = warm.subscribe(|c| println!("Warm reading: {:.1}", c));

    temperature.trigger(19.0).trigger(21.5).trigger(23.0);

    // The cached value is readable at any time
    temperature.last(|c| println!("Last reading: {:.1}", c));

    f_sub.dispose();
    warm_sub.dispose();
    temperature.dispose();
}
