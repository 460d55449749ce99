use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;

use hand_broker::{BrokerConfig, ClientSubscribe, ClientUnsubscribe, Topics};
use handd::{
    event::{step, EventHandler},
    panel::{HandPanel, HandPanelResult},
    ui::Tui,
};
use tracing_appender::rolling;
use tracing_subscriber::FmtSubscriber;

use tracing_log::LogTracer;

/// Terminal control panel for the five servo robotic hand
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Broker endpoint, wss://, ws:// or mqtt:// (plain TCP)
    #[arg(long, default_value = hand_broker::DEFAULT_BROKER_URL)]
    broker: String,

    /// Prefix shared by every hand topic
    #[arg(long, default_value = hand_broker::DEFAULT_TOPIC_PREFIX)]
    topic_prefix: String,

    /// Client id prefix, a random suffix is appended per session
    #[arg(long, default_value = hand_broker::DEFAULT_CLIENT_PREFIX)]
    client_prefix: String,

    /// Directory for the daily rolling log file
    #[arg(long, default_value = "./logs")]
    log_dir: String,

    /// Redraw tick in milliseconds, also refreshes the "last seen" counter
    #[arg(long, default_value_t = 1000)]
    tick_rate: u64,
}

#[actix::main]
async fn main() -> HandPanelResult<()> {
    let args = Args::parse();

    LogTracer::init().expect("Unable to set up log tracer");

    let log = rolling::daily(&args.log_dir, "hand-panel");
    let (nb, _guard) = tracing_appender::non_blocking(log);

    let sub = FmtSubscriber::builder()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(nb)
        .finish();

    tracing::subscriber::set_global_default(sub).expect("Unable to set up tracing subscriber");

    let topics = Topics::new(&args.topic_prefix);
    let config = BrokerConfig {
        url: args.broker,
        client_id: hand_broker::session_id(&args.client_prefix),
        topics: topics.clone(),
        ..Default::default()
    };

    log::info!("Starting hand panel as {}", config.client_id);
    let (broker_handle, publisher) = hand_broker::broker(&config).await?;
    let mut app = HandPanel::new(topics, Arc::new(publisher));
    app.connect();

    let (transport_tx, transport_rx) = unbounded_channel();
    broker_handle
        .send(ClientSubscribe {
            id: 0,
            events: transport_tx,
        })
        .await
        .map_err(|e| {
            log::error!("Error sending client subscribe request {e:}");
            e
        })??;

    let mut events = EventHandler::new(args.tick_rate, transport_rx);
    let mut tui = Tui::new()?;
    tui.init()?;

    while app.running {
        tui.draw(&mut app)?;

        if let Err(e) = step(&mut app, events.next()).await {
            log::error!("Error in app event loop {e:}, exiting");
            break;
        }
    }

    if let Err(e) = broker_handle.send(ClientUnsubscribe { id: 0 }).await {
        log::error!("Error sending client unsubscribe request {e:}");
    }

    tui.exit()?;

    Ok(())
}
