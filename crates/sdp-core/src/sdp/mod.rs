/*! Session Description Protocol (SDP) text handling

This module treats an SDP body as an ordered list of `\r\n` terminated lines,
structured into session-level lines followed by media sections
([RFC 8866 §5.14](https://tools.ietf.org/html/rfc8866#section-5.14)).

# Overview

- **Lines**: [`lines::SdpLines`] splits and rejoins a body losslessly and
  locates media sections by kind.
- **Attributes**: parsers for RTP header extension maps
  ([RFC 8285](https://tools.ietf.org/html/rfc8285)) and ICE candidates
  ([RFC 8839](https://tools.ietf.org/html/rfc8839)).
- **Augment**: inserts a header extension into the first audio and video
  sections of an offer, enabling two-byte header ids when needed.

# Munging an offer

```rust
use loopcall_sdp_core::sdp::augment::{add_header_extension, ABS_CAPTURE_TIME_URI};

let offer = "v=0\r\n\
    m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
    a=extmap:14 urn:ietf:params:rtp-hdrext:toffset\r\n";

let munged = add_header_extension(offer, ABS_CAPTURE_TIME_URI);
assert!(munged.contains("a=extmap:14 urn:ietf:params:rtp-hdrext:toffset\r\n\
    a=extmap-allow-mixed\r\n\
    a=extmap:15 http://www.webrtc.org/experiments/rtp-hdrext/abs-capture-time\r\n"));
```
*/

pub mod attributes;
pub mod augment;
pub mod lines;

pub use augment::{add_header_extension, add_header_extension_with_report};
pub use lines::{MediaKind, SdpLines};
