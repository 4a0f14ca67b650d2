//! Demo accounts and listings for local development.

use covers_authz::Identity;

use crate::bootstrap::Services;
use crate::error::LendingError;
use crate::modules::{books::models::CreateBook, users::models::RegisterUser};

/// Usernames of the demo accounts; each signs in as `<name>@example.com`.
pub const DEMO_USERS: [&str; 20] = [
    "brownbear1981",
    "salmonslayer",
    "glacierguider",
    "rainforestrover",
    "totemcarver",
    "midnightsunseeker",
    "whalewatcher",
    "iceberginnovator",
    "fjordfollower",
    "ravenreveler",
    "pinetreepioneer",
    "moosemarauder",
    "tundratraveler",
    "sitkasprucesavant",
    "eagleeyeed",
    "northernlightslover",
    "ketchikanclimber",
    "mendenhallmystic",
    "halibuthero",
    "bearberrybuddy",
];

const DEMO_BOOKS: [(&str, &str); 12] = [
    ("Coming into the Country", "John McPhee"),
    ("Into the Wild", "Jon Krakauer"),
    ("The Call of the Wild", "Jack London"),
    ("White Fang", "Jack London"),
    ("Two Old Women", "Velma Wallis"),
    ("The Snow Child", "Eowyn Ivey"),
    ("Arctic Dreams", "Barry Lopez"),
    ("Travels in Alaska", "John Muir"),
    ("Shadows on the Koyukuk", "Sidney Huntington"),
    ("Raven's Witness", "Hank Lentfer"),
    ("A Land Gone Lonesome", "Dan O'Neill"),
    ("The Only Kayak", "Kim Heacox"),
];

const BOOKS_PER_USER: usize = 2;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub users_created: usize,
    pub users_skipped: usize,
    pub books_created: usize,
}

/// Registers the demo accounts with `password` and lists a couple of books
/// for each new account. Accounts that already exist are left alone.
pub async fn seed_demo_data(services: &Services, password: &str) -> anyhow::Result<SeedReport> {
    let mut report = SeedReport::default();

    for (index, username) in DEMO_USERS.iter().enumerate() {
        let registered = services
            .users
            .register(RegisterUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password: password.to_string(),
                street1: Some(format!("{} Harbor Way", 100 + index)),
                street2: None,
                zip_code: Some("99801".to_string()),
            })
            .await;

        let user = match registered {
            Ok(response) => response.user,
            Err(LendingError::Conflict(_)) => {
                tracing::debug!(%username, "demo user already present");
                report.users_skipped += 1;
                continue;
            }
            Err(err) => return Err(anyhow::Error::new(err).context(format!("seeding {username}"))),
        };
        report.users_created += 1;

        let owner = Identity {
            user_id: user.id,
            username: user.username,
        };
        for offset in 0..BOOKS_PER_USER {
            let (title, author) = DEMO_BOOKS[(index * BOOKS_PER_USER + offset) % DEMO_BOOKS.len()];
            services
                .books
                .create(
                    &owner,
                    CreateBook {
                        title: title.to_string(),
                        author: author.to_string(),
                        ..CreateBook::default()
                    },
                )
                .await?;
            report.books_created += 1;
        }
    }

    services.database.flush().await?;
    tracing::info!(
        users_created = report.users_created,
        users_skipped = report.users_skipped,
        books_created = report.books_created,
        "demo data seeded"
    );
    Ok(report)
}
