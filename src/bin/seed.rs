use chrono::{Duration, Utc};
use clap::Parser;
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::{Paragraph, Sentence};
use fake::faker::name::en::Name;
use fake::Fake;
use noticeboard::{
    domain::{
        AnnouncementStatus, ApprovalStatus, Attachment, CreateAnnouncementRequest, Priority,
        RecordAcknowledgeRequest, RecordViewRequest,
    },
    repository::{AnnouncementRepository, SqliteAnnouncementRepository},
};
use rand::{seq::SliceRandom, Rng};
use sqlx::sqlite::SqlitePoolOptions;

/// Fill a database with announcements across every department.
#[derive(Parser, Debug)]
#[command(name = "seed", version)]
struct Args {
    /// SQLite URL; falls back to DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,

    /// Announcements to create
    #[arg(long, default_value_t = 24)]
    count: usize,

    /// Employees who view and like announcements
    #[arg(long, default_value_t = 12)]
    users: usize,
}

const AUTHORS: &[&str] = &[
    "Anjanneth Bilas",
    "Payroll Team",
    "Finance Office",
    "Compliance Desk",
    "Internal Audit",
    "Quality Assurance",
    "IT Support",
    "Engineering Leads",
    "Human Resources",
    "Admin Office",
];

const PRIORITIES: &[Priority] = &[Priority::High, Priority::Medium, Priority::Low];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let database_url = args
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite://noticeboard.db?mode=rwc".to_string());

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let repo = SqliteAnnouncementRepository::new(db_pool.clone());
    let mut rng = rand::thread_rng();

    let users: Vec<(String, String, String)> = (0..args.users)
        .map(|i| (format!("emp-{:03}", i + 1), Name().fake(), SafeEmail().fake()))
        .collect();

    println!("📢 Creating announcements...");
    let mut pinned_per_author = std::collections::HashMap::new();
    for i in 0..args.count {
        let author = if rng.gen_bool(0.15) {
            Name().fake::<String>()
        } else {
            AUTHORS.choose(&mut rng).copied().unwrap_or("Admin Office").to_string()
        };

        // Mostly visible, with a few that the client filter has to drop
        let (status, approval_status, expires_at) = match i % 8 {
            5 => (AnnouncementStatus::Inactive, ApprovalStatus::Approved, None),
            6 => (AnnouncementStatus::Active, ApprovalStatus::Pending, None),
            7 => (
                AnnouncementStatus::Active,
                ApprovalStatus::Approved,
                Some(Utc::now() - Duration::hours(rng.gen_range(1..48))),
            ),
            _ => (
                AnnouncementStatus::Active,
                ApprovalStatus::Approved,
                rng.gen_bool(0.3)
                    .then(|| Utc::now() + Duration::minutes(rng.gen_range(2..600))),
            ),
        };

        let attachment = rng.gen_bool(0.2).then(|| Attachment {
            kind: "application/pdf".to_string(),
            name: format!("memo-{}.pdf", i + 1),
            url: format!("https://files.example.com/memo-{}.pdf", i + 1),
        });

        let announcement = repo
            .create(CreateAnnouncementRequest {
                title: Sentence(3..7).fake(),
                agenda: Paragraph(1..3).fake(),
                author: author.clone(),
                priority: PRIORITIES.choose(&mut rng).copied().unwrap_or(Priority::Medium),
                status: Some(status),
                approval_status: Some(approval_status),
                expires_at,
                attachment,
            })
            .await?;

        let pins = pinned_per_author.entry(author.clone()).or_insert(0usize);
        if *pins < 1 && rng.gen_bool(0.25) {
            repo.set_pinned(&announcement.id, true).await?;
            *pins += 1;
        }

        let viewers: Vec<_> = users.iter().filter(|_| rng.gen_bool(0.4)).collect();
        for (user_id, name, email) in viewers {
            repo.record_view(
                &announcement.id,
                &RecordViewRequest {
                    user_id: user_id.clone(),
                    employee_id: Some(user_id.clone()),
                    user_name: Some(name.clone()),
                    user_email: Some(email.clone()),
                    viewed_at: None,
                },
            )
            .await?;

            if rng.gen_bool(0.3) {
                repo.record_acknowledge(
                    &announcement.id,
                    &RecordAcknowledgeRequest {
                        user_id: user_id.clone(),
                        employee_id: Some(user_id.clone()),
                        user_name: Some(name.clone()),
                        user_email: Some(email.clone()),
                        acknowledged_at: None,
                    },
                )
                .await?;
            }
        }

        println!("  ✅ {} ({})", announcement.title, author);
    }

    println!("\n✨ Seeding complete!");
    println!("   {} announcements, {} users", args.count, args.users);

    Ok(())
}
