pub mod cluster;
pub mod link;
pub mod node;

pub use cluster::*;
pub use link::*;
pub use node::*;

/*
    Every exchange is point to point over its own TCP connection: the proposer
    connects, writes one request line, reads one reply line and closes. There is
    no connection reuse and no ordering between peers. A peer that does not
    answer within the link timeout is retried a bounded number of times and
    then simply counts as a missing vote.
*/
