use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "crm-cli")]
#[command(about = "CLI for the edu_crm REST API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "http://localhost:11111")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    Health,
    ListContacts {
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(short, long)]
        tag: Option<String>,
    },
    GetContact {
        #[arg(short, long)]
        id: String,
    },
    CreateContact {
        #[arg(short = 'f', long)]
        first_name: String,
        #[arg(short = 'l', long)]
        last_name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(short, long, default_value = "organic")]
        source: String,
        #[arg(long)]
        score: Option<u8>,
    },
    DeleteContact {
        #[arg(short, long)]
        id: String,
    },
    ListProducts,
    ToggleProduct {
        #[arg(short, long)]
        id: String,
    },
    ListSubscriptions,
    SetStatus {
        #[arg(short, long)]
        id: String,
        #[arg(short, long)]
        status: String,
    },
    AddMember {
        #[arg(short, long)]
        id: String,
        #[arg(short, long)]
        contact_id: String,
    },
    ListPurchases,
    ListCampaigns,
    RecordMetrics {
        #[arg(short, long)]
        id: String,
        #[arg(long)]
        sent: u64,
        #[arg(long)]
        delivered: u64,
        #[arg(long)]
        opened: u64,
        #[arg(long)]
        clicked: u64,
        #[arg(long, default_value_t = 0)]
        unsubscribed: u64,
        #[arg(long, default_value_t = 0)]
        bounced: u64,
    },
    Segments,
    SegmentMembers {
        #[arg(short, long)]
        dimension: String,
        #[arg(short, long)]
        value: String,
    },
    Dashboard,
    CampaignStats,
    Report {
        #[arg(short, long, default_value = "30d")]
        range: String,
        /// Write the export on the server instead of printing it.
        #[arg(long)]
        save: bool,
    },
    Settings,
    ConnectStripe,
}

async fn send(request: RequestBuilder) -> Result<(), Box<dyn std::error::Error>> {
    let res = request.send().await?;
    let status = res.status();
    let text = res.text().await?;
    let body = match serde_json::from_str::<Value>(&text) {
        Ok(value) => serde_json::to_string_pretty(&value)?,
        Err(_) => text,
    };
    if status.is_success() {
        println!("{body}");
    } else {
        println!("Request failed ({status}): {body}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new();
    let url = cli.url.trim_end_matches('/');

    let request = match cli.command {
        Commands::Health => client.get(format!("{url}/health")),
        Commands::ListContacts { search, tag } => {
            let mut query = vec![("search", search)];
            if let Some(tag) = tag {
                query.push(("tag", tag));
            }
            client.get(format!("{url}/contacts")).query(&query)
        }
        Commands::GetContact { id } => client.get(format!("{url}/contacts/{id}")),
        Commands::CreateContact {
            first_name,
            last_name,
            email,
            tags,
            source,
            score,
        } => client.post(format!("{url}/contacts")).json(&json!({
            "firstName": first_name,
            "lastName": last_name,
            "email": email,
            "tags": tags,
            "source": source,
            "engagementScore": score,
        })),
        Commands::DeleteContact { id } => client.delete(format!("{url}/contacts/{id}")),
        Commands::ListProducts => client.get(format!("{url}/products")),
        Commands::ToggleProduct { id } => client.post(format!("{url}/products/{id}/toggle")),
        Commands::ListSubscriptions => client.get(format!("{url}/subscriptions")),
        Commands::SetStatus { id, status } => client
            .post(format!("{url}/subscriptions/{id}/status"))
            .json(&json!({ "status": status })),
        Commands::AddMember { id, contact_id } => client
            .post(format!("{url}/subscriptions/{id}/team"))
            .json(&json!({ "contactId": contact_id })),
        Commands::ListPurchases => client.get(format!("{url}/purchases")),
        Commands::ListCampaigns => client.get(format!("{url}/campaigns")),
        Commands::RecordMetrics {
            id,
            sent,
            delivered,
            opened,
            clicked,
            unsubscribed,
            bounced,
        } => client
            .post(format!("{url}/campaigns/{id}/metrics"))
            .json(&json!({
                "sent": sent,
                "delivered": delivered,
                "opened": opened,
                "clicked": clicked,
                "unsubscribed": unsubscribed,
                "bounced": bounced,
            })),
        Commands::Segments => client.get(format!("{url}/segments")),
        Commands::SegmentMembers { dimension, value } => client
            .get(format!("{url}/segments/members"))
            .query(&[("dimension", dimension), ("value", value)]),
        Commands::Dashboard => client.get(format!("{url}/analytics/dashboard")),
        Commands::CampaignStats => client.get(format!("{url}/analytics/campaigns")),
        Commands::Report { range, save } => {
            let endpoint = format!("{url}/reports/export");
            let request = if save {
                client.post(endpoint)
            } else {
                client.get(endpoint)
            };
            request.query(&[("range", range)])
        }
        Commands::Settings => client.get(format!("{url}/settings")),
        Commands::ConnectStripe => client.post(format!("{url}/settings/stripe")),
    };

    send(request).await
}
