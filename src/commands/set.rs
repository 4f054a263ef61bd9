use tokio::time::Duration;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::reply::Reply;
use crate::store::Store;

/// Set `key` to hold the string `value`. If `key` already holds a value, it is overwritten.
///
/// The only options understood are `PX milliseconds` and `EX seconds`. An option that is unknown,
/// or whose amount is missing, not a number or not positive, leaves the key without a TTL instead
/// of failing the command.
///
/// Ref: <https://redis.io/docs/latest/commands/set/>
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: String,
    pub value: String,
    pub ttl: Option<Duration>,
}

impl Executable for Set {
    fn exec(self, store: &Store) -> Reply {
        store.set(self.key, self.value, self.ttl);

        Reply::ok()
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let value = parser.next_string()?;

        let ttl = match parser.next_optional() {
            Some(option) => {
                let amount = parser
                    .next_optional()
                    .and_then(|amount| amount.parse::<u64>().ok())
                    .filter(|amount| *amount > 0);

                match option.to_uppercase().as_str() {
                    "PX" => amount.map(Duration::from_millis),
                    "EX" => amount.map(Duration::from_secs),
                    _ => None,
                }
            }
            None => None,
        };

        Ok(Self { key, value, ttl })
    }
}
