//! End-to-end checks across the codec and graph APIs.

use std::sync::{Arc, Mutex};

use segue_core::{
    AudioBuffer, Effect, Graph, GraphError, OnePole, Patchbay, Rewire, UnitId, chunk,
    insert_node_between, remove_node,
};

#[derive(Default)]
struct Released(Mutex<Vec<u32>>);

impl Patchbay for Released {
    fn connect_units(&self, _: UnitId, _: UnitId) {}
    fn disconnect_units(&self, _: UnitId, _: UnitId) {}
    fn release_units(&self, units: &[UnitId]) {
        self.0
            .lock()
            .unwrap()
            .extend(units.iter().map(|u| u.index()));
    }
}

#[test]
fn resume_mid_track_from_chunks() {
    let sr = 1000;
    let samples: Vec<f32> = (0..35_000).map(|i| i as f32).collect();
    let buffer = AudioBuffer::new(vec![samples.clone()], sr).unwrap();
    let chunks = chunk::encode(&buffer, "t", 10.0).unwrap();
    assert_eq!(chunks.len(), 4);
    assert_eq!(chunks[3].frame_count(), 5000);

    let pos = chunk::locate(23.25, 10.0).unwrap();
    assert_eq!(pos.chunk_index, 2);
    let first = chunk::offset(&chunks[pos.chunk_index as usize], pos.within_secs).unwrap();

    let mut replay = chunk::decode(&first).into_channels().remove(0);
    for c in &chunks[pos.chunk_index as usize + 1..] {
        replay.extend_from_slice(chunk::decode(c).channel(0).unwrap());
    }
    assert_eq!(replay, samples[23_250..].to_vec());
}

#[test]
fn effect_stage_lifecycle() {
    let bay = Arc::new(Released::default());
    {
        let mut graph = Graph::new(bay.clone(), UnitId::from_raw(1), UnitId::from_raw(0));
        let (src, dst) = (graph.input(), graph.output());
        let gain = graph.add_node(UnitId::from_raw(2));
        insert_node_between(&mut graph, gain, src, dst).unwrap();
        let lowpass = graph.add_node(UnitId::from_raw(3));
        insert_node_between(&mut graph, lowpass, src, gain).unwrap();

        assert_eq!(graph.edges(), vec![(src, lowpass), (gain, dst), (lowpass, gain)]);
        assert_eq!(
            insert_node_between(&mut graph, lowpass, src, gain),
            Err(GraphError::EdgeNotFound(src, gain))
        );

        remove_node(&mut graph, lowpass, Some(Rewire::default())).unwrap();
        assert!(graph.has_edge(src, gain));
    }
    assert_eq!(*bay.0.lock().unwrap(), vec![1, 0, 2, 3]);
}

#[test]
fn lowpass_over_decoded_chunk() {
    let chunk = segue_core::AudioChunk::new("t", 0, vec![vec![1.0; 4800]], 48000).unwrap();
    let mut data = chunk::decode(&chunk).into_channels().remove(0);
    let mut lp = OnePole::new(48000.0, 500.0);
    for sample in &mut data {
        *sample = lp.process(*sample);
    }
    assert!(data[0] < 0.1);
    assert!(data[4799] > 0.99);
}
